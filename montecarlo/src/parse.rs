use crate::die::WeightedDie;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

////////////////////
// parse::DieSpec //
////////////////////

/// A die as written on the command line: either `d<N>` for faces `1..=N`, or a
/// bracketed face list where each face may carry a weight, e.g.
/// `[1,2,3,4,5,6:5]` or `[H,T:0.5]`. Unweighted faces keep the default weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DieSpec(Vec<(String, Option<f64>)>);

impl DieSpec {
    /// Faces `1..=nfaces`, all with the default weight.
    pub fn standard(nfaces: u32) -> Self {
        Self((1..=nfaces).map(|face| (face.to_string(), None)).collect())
    }

    pub fn faces(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(face, _)| face.as_str())
    }

    pub fn to_die(&self) -> Result<WeightedDie<String>, String> {
        let mut die = WeightedDie::new(self.faces().map(str::to_owned))
            .map_err(|err| format!("invalid die '{}': {}", self, err))?;

        for (face, weight) in &self.0 {
            if let Some(weight) = weight {
                die.set_weight(face.as_str(), *weight)
                    .map_err(|err| format!("invalid die '{}': {}", self, err))?;
            }
        }

        Ok(die)
    }
}

impl FromStr for DieSpec {
    type Err = String;

    // d6
    // [1,2,3,4,5,6:5]

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        // `d<N>` only when N is all digits, so faces like `dog` still parse
        let shorthand = s
            .strip_prefix('d')
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));

        if let Some(nfaces_str) = shorthand {
            let nfaces = nfaces_str.parse::<u32>().map_err(|err| {
                format!("failed to parse number of faces: '{}', error: {}", nfaces_str, err)
            })?;
            if nfaces == 0 {
                return Err("a die needs at least one face: 'd0'".to_owned());
            }
            return Ok(Self::standard(nfaces));
        }

        let s = s.trim_start_matches('[');
        let s = s.trim_end_matches(']');

        let splitters = &[',', ' ', '\n', '\t'];

        let mut faces = Vec::new();
        for face_str in s.split(splitters).filter(|s| !s.is_empty()) {
            match face_str.split_once(':') {
                Some((face, weight_str)) => {
                    let weight = weight_str.parse::<f64>().map_err(|err| {
                        format!("failed to parse weight: '{}', error: {}", weight_str, err)
                    })?;
                    if face.is_empty() {
                        return Err(format!("missing face before weight: '{}'", face_str));
                    }
                    faces.push((face.to_owned(), Some(weight)));
                }
                None => faces.push((face_str.to_owned(), None)),
            }
        }

        if faces.is_empty() {
            return Err("a die needs at least one face: '[]'".to_owned());
        }

        Ok(Self(faces))
    }
}

impl fmt::Display for DieSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, (face, weight)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            match weight {
                Some(weight) => write!(f, "{}:{}", face, weight)?,
                None => write!(f, "{}", face)?,
            }
        }
        f.write_str("]")
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use claim::assert_err;

    fn spec(faces: &[(&str, Option<f64>)]) -> DieSpec {
        DieSpec(
            faces
                .iter()
                .map(|&(face, weight)| (face.to_owned(), weight))
                .collect(),
        )
    }

    #[test]
    fn test_die_spec_from_str() {
        assert_eq!(DieSpec::standard(6), DieSpec::from_str("d6").unwrap());
        assert_eq!(
            spec(&[("1", None), ("2", None), ("3", None)]),
            DieSpec::from_str("d3").unwrap()
        );
        assert_eq!(
            spec(&[("H", None), ("T", Some(0.5))]),
            DieSpec::from_str("[H,T:0.5]").unwrap()
        );
        assert_eq!(
            spec(&[("1", None), ("2", None), ("6", Some(5.0))]),
            DieSpec::from_str(" [ 1, 2, 6:5 ] ").unwrap()
        );
        assert_eq!(
            spec(&[("a", None), ("b", None)]),
            DieSpec::from_str("a,b").unwrap()
        );

        assert_err!(DieSpec::from_str("d0"));
        assert_eq!(spec(&[("dx", None)]), DieSpec::from_str("dx").unwrap());
        assert_eq!(
            spec(&[("dog", None), ("cat", Some(2.0))]),
            DieSpec::from_str("dog,cat:2").unwrap()
        );
        assert_eq!(spec(&[("d6", None), ("d8", None)]), DieSpec::from_str("[d6,d8]").unwrap());
        assert_err!(DieSpec::from_str("d99999999999"));
        assert_err!(DieSpec::from_str("[]"));
        assert_err!(DieSpec::from_str(""));
        assert_err!(DieSpec::from_str("[1,2:x]"));
        assert_err!(DieSpec::from_str("[1,:2]"));
    }

    #[test]
    fn test_die_spec_display() {
        let s = "[1,2,6:5]";
        assert_eq!(s, DieSpec::from_str(s).unwrap().to_string());
        assert_eq!("[1,2,3]", DieSpec::standard(3).to_string());
    }

    #[test]
    fn test_die_spec_to_die() {
        let die = DieSpec::from_str("[H,T:0.5]").unwrap().to_die().unwrap();
        assert_eq!(vec![("H".to_owned(), 1.0), ("T".to_owned(), 0.5)], die.show());

        assert_err!(DieSpec::from_str("[1,2,2]").unwrap().to_die());
        assert_err!(DieSpec::from_str("[1,2:inf]").unwrap().to_die());
    }
}
