use serde::{Deserialize, Serialize};

use crate::GridError;
use crate::note::{NoteSpec, STRING_COUNT, validate_fret};

/// A chord shape as supplied by the chord database.
///
/// `frets` is indexed low E first (database order). Each entry is relative to
/// `base_fret`: `None` or a negative value mutes the string, `0` is the open
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordShape {
    pub root_key: String,
    pub suffix: String,
    pub base_fret: u8,
    pub frets: [Option<i8>; STRING_COUNT as usize],
}

/// One sounding string of a chord shape, in grid terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordTone {
    /// Position in the shape's `frets` array.
    pub slot: u8,
    pub string: u8,
    pub fret: u8,
}

impl ChordShape {
    /// Absolute frets of the non-muted strings, bass string first.
    pub fn tones(&self) -> Result<Vec<ChordTone>, GridError> {
        let mut tones = Vec::with_capacity(STRING_COUNT as usize);
        for (slot, rel) in self.frets.iter().enumerate() {
            let Some(rel) = rel.filter(|r| *r >= 0) else {
                continue;
            };
            let fret = if rel > 0 {
                u32::from(self.base_fret) + rel as u32 - 1
            } else {
                0
            };
            let fret = u8::try_from(fret).map_err(|_| GridError::InvalidFret(u8::MAX))?;
            validate_fret(fret)?;
            tones.push(ChordTone {
                slot: slot as u8,
                string: STRING_COUNT - slot as u8,
                fret,
            });
        }
        Ok(tones)
    }

    /// Notes for this shape at a common beat.
    pub fn note_specs(&self, beat: u32, duration: u32) -> Result<Vec<NoteSpec>, GridError> {
        Ok(self
            .tones()?
            .into_iter()
            .map(|t| NoteSpec::audible(t.string, t.fret, beat, duration))
            .collect())
    }

    /// Stable identity of the fingering, e.g. `x-3-2-0-1-0`.
    pub fn fret_pattern(&self) -> String {
        self.frets
            .iter()
            .map(|f| match f {
                Some(rel) if *rel > 0 => (i32::from(self.base_fret) + i32::from(*rel) - 1).to_string(),
                Some(0) => "0".to_string(),
                _ => "x".to_string(),
            })
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.root_key, self.suffix)
    }
}

impl std::str::FromStr for ChordShape {
    type Err = GridError;

    /// Parse an absolute fingering such as `x32010` or `x-3-2-0-1-0`
    /// (low E first).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains('-') {
            s.split('-').collect()
        } else {
            s.split("").filter(|p| !p.is_empty()).collect()
        };
        if parts.len() != STRING_COUNT as usize {
            return Err(GridError::InvalidShape(s.to_string()));
        }

        let mut frets = [None; STRING_COUNT as usize];
        for (slot, part) in parts.iter().enumerate() {
            if part.eq_ignore_ascii_case("x") {
                continue;
            }
            let fret: u8 = part
                .parse()
                .map_err(|_| GridError::InvalidShape(s.to_string()))?;
            validate_fret(fret)?;
            // base fret 1 makes relative and absolute frets coincide
            frets[slot] = Some(fret as i8);
        }

        Ok(Self {
            root_key: String::new(),
            suffix: String::new(),
            base_fret: 1,
            frets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> ChordShape {
        ChordShape {
            root_key: "C".to_string(),
            suffix: "major".to_string(),
            base_fret: 1,
            frets: [None, Some(3), Some(2), Some(0), Some(1), Some(0)],
        }
    }

    #[test]
    fn test_tones_skip_muted_strings() {
        let tones = c_major().tones().expect("tones");
        assert_eq!(tones.len(), 5);
        // slot 1 is the A string, which is UI string 5
        assert_eq!(tones[0], ChordTone { slot: 1, string: 5, fret: 3 });
        assert_eq!(tones[4], ChordTone { slot: 5, string: 1, fret: 0 });
    }

    #[test]
    fn test_base_fret_offsets_relative_frets() {
        let barre = ChordShape {
            root_key: "A".to_string(),
            suffix: "m".to_string(),
            base_fret: 5,
            frets: [Some(1), Some(3), Some(3), Some(1), Some(1), Some(-1)],
        };
        let tones = barre.tones().expect("tones");
        let frets: Vec<u8> = tones.iter().map(|t| t.fret).collect();
        assert_eq!(frets, vec![5, 7, 7, 5, 5]);
        assert_eq!(barre.fret_pattern(), "5-7-7-5-5-x");
    }

    #[test]
    fn test_shape_beyond_fretboard_is_rejected() {
        let high = ChordShape {
            root_key: "E".to_string(),
            suffix: String::new(),
            base_fret: 23,
            frets: [Some(4), None, None, None, None, None],
        };
        assert_eq!(high.tones(), Err(GridError::InvalidFret(26)));
    }

    #[test]
    fn test_parse_compact_and_dashed_patterns() {
        let compact: ChordShape = "x32010".parse().expect("parse");
        assert_eq!(compact.fret_pattern(), "x-3-2-0-1-0");

        let dashed: ChordShape = "x-10-12-12-12-10".parse().expect("parse");
        assert_eq!(dashed.fret_pattern(), "x-10-12-12-12-10");

        assert!("x3201".parse::<ChordShape>().is_err());
        assert!("x3201q".parse::<ChordShape>().is_err());
    }

    #[test]
    fn test_deserialize_null_as_muted() {
        let json = r#"{"rootKey":"G","suffix":"7","baseFret":1,"frets":[3,2,0,0,0,null]}"#;
        let shape: ChordShape = serde_json::from_str(json).expect("deserialize");
        assert_eq!(shape.tones().expect("tones").len(), 5);
        assert_eq!(shape.name(), "G7");
    }
}
