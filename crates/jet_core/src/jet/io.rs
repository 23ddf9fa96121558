//! Plain text format of a jet.
//!
//! ```text
//! degree
//! dimension
//! image dimension
//!
//! one coefficient per line, in storage order
//!
//! ```

use super::Jet;
use crate::cn_container::ShapePolicy;
use crate::combinatorics::binomial_direct;
use crate::error::{JetError, Result};
use crate::traits::Scalar;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

impl<T: Scalar + Display> Jet<T> {
    /// Writes the header and every coefficient. Floats use the shortest
    /// representation that parses back to the same value.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        write!(
            writer,
            "{}\n{}\n{}\n\n",
            self.degree(),
            self.dimension(),
            self.image_dimension()
        )?;
        for c in self.iter() {
            writeln!(writer, "{c}")?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl<T: Scalar + FromStr> Jet<T> {
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut jet = Self::new(0, 0, 0)?;
        jet.load_into(reader)?;
        Ok(jet)
    }

    /// Reads one jet over `self`, reallocating when the stored shape differs.
    ///
    /// Exactly the header and its coefficients are consumed, so several jets
    /// can be read back to back from one stream. On error `self` is untouched.
    pub fn load_into<R: BufRead>(&mut self, mut reader: R) -> Result<()> {
        let degree: usize = next_value(&mut reader, "degree")?;
        let dimension: usize = next_value(&mut reader, "dimension")?;
        let image: usize = next_value(&mut reader, "image dimension")?;
        let same_shape = self.has_shape(image, dimension, degree);
        if !same_shape && self.policy() == ShapePolicy::Fixed {
            return Err(JetError::ResizeForbidden {
                image: self.image_dimension(),
                dimension: self.dimension(),
                degree: self.degree(),
            });
        }
        let top = dimension
            .checked_add(degree)
            .ok_or_else(|| JetError::Overflow(format!("dimension {dimension} + degree {degree}")))?;
        let block = binomial_direct(top, degree)?;
        let len = image
            .checked_mul(block)
            .ok_or_else(|| JetError::Overflow(format!("container size {image} x {block}")))?;

        let mut values = Vec::new();
        for _ in 0..len {
            values.push(next_value::<T, _>(&mut reader, "coefficient")?);
        }
        if !same_shape {
            log::debug!("reallocating jet to image {image}, dimension {dimension}, degree {degree}");
            self.reshape(image, dimension, degree)?;
        }
        for (slot, value) in self.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }
}

/// Next whitespace separated token; `None` at end of stream.
///
/// Stops right after the token so the rest of the stream stays unread.
fn next_token<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut token = Vec::new();
    loop {
        let (used, done) = {
            let buffer = reader.fill_buf()?;
            if buffer.is_empty() {
                break;
            }
            let mut used = 0;
            let mut done = false;
            for &byte in buffer {
                if byte.is_ascii_whitespace() {
                    if !token.is_empty() {
                        done = true;
                        break;
                    }
                } else {
                    token.push(byte);
                }
                used += 1;
            }
            (used, done)
        };
        reader.consume(used);
        if done {
            break;
        }
    }
    if token.is_empty() {
        return Ok(None);
    }
    String::from_utf8(token)
        .map(Some)
        .map_err(|_| JetError::MalformedInput("token is not valid UTF-8".to_string()))
}

fn next_value<V: FromStr, R: BufRead>(reader: &mut R, what: &str) -> Result<V> {
    let token = next_token(reader)?
        .ok_or_else(|| JetError::MalformedInput(format!("stream ended before {what}")))?;
    token
        .parse()
        .map_err(|_| JetError::MalformedInput(format!("cannot parse {what} from '{token}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_writes_header_then_coefficients() {
        let mut f = Jet::<f64>::new(1, 1, 2).expect("jet should allocate");
        f[0] = 1.5;
        f[2] = -0.25;
        let mut buffer = Vec::new();
        f.save(&mut buffer).expect("save");
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text, "2\n1\n1\n\n1.5\n0\n-0.25\n\n");
    }

    #[test]
    fn save_load_round_trip_is_bit_identical() {
        let mut f = Jet::<f64>::new(2, 3, 3).expect("jet should allocate");
        for (k, c) in f.iter_mut().enumerate() {
            *c = (k as f64 + 1.0).sqrt() / 3.0 - 1e-300 * k as f64;
        }
        *f.value_mut(1).expect("value") = f64::MIN_POSITIVE;
        let mut buffer = Vec::new();
        f.save(&mut buffer).expect("save");

        let loaded = Jet::<f64>::load(buffer.as_slice()).expect("load");
        assert!(loaded.has_shape(2, 3, 3));
        for (a, b) in f.iter().zip(loaded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn load_into_reallocates_to_stored_shape() {
        let source = Jet::<f64>::identity(2, 2).expect("identity");
        let mut buffer = Vec::new();
        source.save(&mut buffer).expect("save");
        let mut target = Jet::<f64>::new(1, 1, 1).expect("jet should allocate");
        target.load_into(buffer.as_slice()).expect("load");
        assert_eq!(target, source);
    }

    #[test]
    fn malformed_streams_are_rejected() {
        let short = "1\n2\n1\n\n0\n1\n";
        let err = Jet::<f64>::load(short.as_bytes()).expect_err("missing coefficient");
        assert!(format!("{err}").contains("stream ended before coefficient"));

        let garbage = "1\n1\n1\n\n0\nabc\n";
        let err = Jet::<f64>::load(garbage.as_bytes()).expect_err("bad coefficient");
        assert!(format!("{err}").contains("cannot parse coefficient from 'abc'"));

        let bad_header = "x\n1\n1\n";
        assert!(matches!(
            Jet::<f64>::load(bad_header.as_bytes()),
            Err(JetError::MalformedInput(_))
        ));
    }

    #[test]
    fn consecutive_jets_share_one_stream() {
        let first = Jet::<f64>::identity(2, 2).expect("identity");
        let mut second = Jet::<f64>::new(1, 1, 3).expect("jet should allocate");
        second[3] = 0.125;
        let mut buffer = Vec::new();
        first.save(&mut buffer).expect("save");
        second.save(&mut buffer).expect("save");
        buffer.extend_from_slice(b"tail");

        let mut stream = buffer.as_slice();
        assert_eq!(Jet::<f64>::load(&mut stream).expect("first"), first);
        assert_eq!(Jet::<f64>::load(&mut stream).expect("second"), second);
        assert_eq!(stream, b"\n\ntail");
    }

    #[test]
    fn failed_load_leaves_target_unchanged() {
        let mut target = Jet::<f64>::identity(2, 1).expect("identity");
        let before = target.clone();
        let err = target
            .load_into("1\n1\n1\n\n4\noops\n".as_bytes())
            .expect_err("bad coefficient");
        assert!(matches!(err, JetError::MalformedInput(_)));
        assert_eq!(target, before);

        let err = target.load_into("2\n2\n2\n\n1\n".as_bytes()).expect_err("short");
        assert!(matches!(err, JetError::MalformedInput(_)));
        assert_eq!(target, before);
    }

    #[test]
    fn oversized_header_is_not_trusted() {
        let err = Jet::<f64>::load("100000\n1\n1\n".as_bytes()).expect_err("no coefficients");
        assert!(format!("{err}").contains("stream ended before coefficient"));
        assert!(crate::combinatorics::shared_known_level() < 100_000);

        let err = Jet::<f64>::load("1\n1\n18446744073709551615\n".as_bytes()).expect_err("overflow");
        assert!(matches!(err, JetError::Overflow(_)));

        let err = Jet::<f64>::load("18446744073709551615\n1\n1\n".as_bytes()).expect_err("overflow");
        assert!(matches!(err, JetError::Overflow(_)));
    }

    #[test]
    fn fixed_target_refuses_other_shapes() {
        let source = Jet::<f64>::identity(2, 2).expect("identity");
        let mut buffer = Vec::new();
        source.save(&mut buffer).expect("save");
        let mut target: Jet<f64> = crate::cn_container::CnContainer::fixed(1, 1, 1)
            .expect("container should allocate")
            .into();
        assert!(matches!(
            target.load_into(buffer.as_slice()),
            Err(JetError::ResizeForbidden { .. })
        ));
    }
}
