//! Decoder for the TS-CNS personal-data record.
//!
//! The record is a proprietary fixed-schema encoding with no field tags: a
//! six-byte header, then eleven fields in a fixed order, each introduced by
//! its length as two ASCII hex digits. Only position determines identity, so
//! a single misaligned read corrupts every field after it — the decode is
//! all-or-nothing, and the walk is done with bounds-checked `nom` takes
//! rather than a hand-incremented index.

use crate::errors::{Error, Result};
use nom::bytes::complete::take;
use nom::combinator::{map, map_opt};
use tracing::trace_span;

pub type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// Fixed header preceding the first length prefix. Its internal structure is
/// not specified by the card profile; it carries no field content and is
/// always skipped whole.
const HEADER_LEN: usize = 6;

/// The eleven fields, in on-card order. [`Field::ALL`] is that order; it is
/// part of the card profile, not a presentation choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Issuer,
    IssueDate,
    ExpiryDate,
    Surname,
    GivenName,
    BirthDate,
    Sex,
    Height,
    FiscalCode,
    Citizenship,
    BirthMunicipality,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Issuer,
        Field::IssueDate,
        Field::ExpiryDate,
        Field::Surname,
        Field::GivenName,
        Field::BirthDate,
        Field::Sex,
        Field::Height,
        Field::FiscalCode,
        Field::Citizenship,
        Field::BirthMunicipality,
    ];

    /// Date fields arrive as `DDMMYYYY` and are presented as `DD/MM/YYYY`.
    pub fn is_date(&self) -> bool {
        matches!(self, Field::IssueDate | Field::ExpiryDate | Field::BirthDate)
    }

    /// Human-readable label, for terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Issuer => "Issuer",
            Field::IssueDate => "Issue date",
            Field::ExpiryDate => "Expiry date",
            Field::Surname => "Surname",
            Field::GivenName => "Given name",
            Field::BirthDate => "Birth date",
            Field::Sex => "Sex",
            Field::Height => "Height",
            Field::FiscalCode => "Fiscal code",
            Field::Citizenship => "Citizenship",
            Field::BirthMunicipality => "Birth municipality",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Issuer => "issuer",
            Field::IssueDate => "issue_date",
            Field::ExpiryDate => "expiry_date",
            Field::Surname => "surname",
            Field::GivenName => "given_name",
            Field::BirthDate => "birth_date",
            Field::Sex => "sex",
            Field::Height => "height",
            Field::FiscalCode => "fiscal_code",
            Field::Citizenship => "citizenship",
            Field::BirthMunicipality => "birth_municipality",
        };
        f.write_str(name)
    }
}

/// What went wrong while decoding one field. Any of these invalidates the
/// whole record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeCause {
    #[error("field runs past the end of the record")]
    Truncated,
    #[error("length prefix is not two hex digits")]
    BadLengthPrefix,
    #[error("value is not ASCII")]
    NotAscii,
    #[error("date is {0} characters long, want 8 (DDMMYYYY)")]
    BadDate(usize),
}

/// The decoded record. A `None` field was declared with length zero on the
/// card; it is absent, never an empty string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersonalData {
    pub issuer: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub height: Option<String>,
    pub fiscal_code: Option<String>,
    pub citizenship: Option<String>,
    pub birth_municipality: Option<String>,
}

impl PersonalData {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Issuer => self.issuer.as_deref(),
            Field::IssueDate => self.issue_date.as_deref(),
            Field::ExpiryDate => self.expiry_date.as_deref(),
            Field::Surname => self.surname.as_deref(),
            Field::GivenName => self.given_name.as_deref(),
            Field::BirthDate => self.birth_date.as_deref(),
            Field::Sex => self.sex.as_deref(),
            Field::Height => self.height.as_deref(),
            Field::FiscalCode => self.fiscal_code.as_deref(),
            Field::Citizenship => self.citizenship.as_deref(),
            Field::BirthMunicipality => self.birth_municipality.as_deref(),
        }
    }

    /// All fields in on-card order, present or not.
    pub fn fields(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        Field::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Issuer => &mut self.issuer,
            Field::IssueDate => &mut self.issue_date,
            Field::ExpiryDate => &mut self.expiry_date,
            Field::Surname => &mut self.surname,
            Field::GivenName => &mut self.given_name,
            Field::BirthDate => &mut self.birth_date,
            Field::Sex => &mut self.sex,
            Field::Height => &mut self.height,
            Field::FiscalCode => &mut self.fiscal_code,
            Field::Citizenship => &mut self.citizenship,
            Field::BirthMunicipality => &mut self.birth_municipality,
        };
        *slot = Some(value);
    }
}

/// Two ASCII hex digits, parsed as a base-16 length 0-255.
fn field_len(input: &[u8]) -> IResult<u8> {
    map_opt(take(2usize), |d: &[u8]| {
        std::str::from_utf8(d)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    })(input)
}

/// One length-prefixed field; `None` for a declared length of zero.
/// Consumes exactly `L + 2` bytes.
fn field_value(input: &[u8]) -> IResult<Option<&[u8]>> {
    let (input, len) = field_len(input)?;
    if len == 0 {
        return Ok((input, None));
    }
    map(take(len as usize), Some)(input)
}

fn cause_of(err: nom::Err<nom::error::Error<&[u8]>>) -> DecodeCause {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            nom::error::ErrorKind::MapOpt => DecodeCause::BadLengthPrefix,
            _ => DecodeCause::Truncated,
        },
        nom::Err::Incomplete(_) => DecodeCause::Truncated,
    }
}

/// Decodes a raw personal-data record. Returns the complete record or the
/// first field-level failure; never a partially filled record, so callers
/// can't act on silently truncated identity data.
pub fn decode(record: &[u8]) -> Result<PersonalData> {
    let span = trace_span!("decode");
    let _enter = span.enter();

    let mut input = record.get(HEADER_LEN..).ok_or(Error::Decode {
        field: Field::Issuer,
        cause: DecodeCause::Truncated,
    })?;

    let mut data = PersonalData::default();
    for field in Field::ALL {
        let (rest, raw) = field_value(input).map_err(|e| Error::Decode {
            field,
            cause: cause_of(e),
        })?;
        input = rest;

        let raw = match raw {
            Some(raw) => raw,
            None => continue,
        };
        if !raw.is_ascii() {
            return Err(Error::Decode {
                field,
                cause: DecodeCause::NotAscii,
            });
        }
        let text = std::str::from_utf8(raw).map_err(|_| Error::Decode {
            field,
            cause: DecodeCause::NotAscii,
        })?;

        let value = if field.is_date() {
            reformat_date(text).map_err(|cause| Error::Decode { field, cause })?
        } else {
            text.to_owned()
        };
        data.set(field, value);
    }
    Ok(data)
}

/// `DDMMYYYY` → `DD/MM/YYYY`. Anything that isn't exactly 8 characters is an
/// error, not a guess at a substring.
fn reformat_date(raw: &str) -> std::result::Result<String, DecodeCause> {
    if raw.len() != 8 {
        return Err(DecodeCause::BadDate(raw.len()));
    }
    Ok(format!("{}/{}/{}", &raw[0..2], &raw[2..4], &raw[4..8]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn push_field(rec: &mut Vec<u8>, value: &str) {
        rec.extend_from_slice(format!("{:02X}", value.len()).as_bytes());
        rec.extend_from_slice(value.as_bytes());
    }

    /// A full record in on-card layout: 6-byte header, then all 11 fields,
    /// with the height left empty as it is on real cards.
    pub(crate) fn sample_record() -> Vec<u8> {
        let mut rec = vec![0u8; 6];
        push_field(&mut rec, "MININT"); // issuer
        push_field(&mut rec, "01012030"); // issue date
        push_field(&mut rec, "01012036"); // expiry date
        push_field(&mut rec, "ROSSI"); // surname
        push_field(&mut rec, "MARIO"); // given name
        push_field(&mut rec, "31121980"); // birth date
        push_field(&mut rec, "M"); // sex
        push_field(&mut rec, ""); // height, declared empty
        push_field(&mut rec, "RSSMRA80T31H501X"); // fiscal code
        push_field(&mut rec, "ITA"); // citizenship
        push_field(&mut rec, "ROMA"); // birth municipality
        rec
    }

    #[test]
    fn decode_full_record() {
        let data = decode(&sample_record()).unwrap();
        assert_eq!(
            data,
            PersonalData {
                issuer: Some("MININT".into()),
                issue_date: Some("01/01/2030".into()),
                expiry_date: Some("01/01/2036".into()),
                surname: Some("ROSSI".into()),
                given_name: Some("MARIO".into()),
                birth_date: Some("31/12/1980".into()),
                sex: Some("M".into()),
                height: None,
                fiscal_code: Some("RSSMRA80T31H501X".into()),
                citizenship: Some("ITA".into()),
                birth_municipality: Some("ROMA".into()),
            },
        );
    }

    #[test]
    fn zero_length_field_is_absent() {
        let data = decode(&sample_record()).unwrap();
        assert_eq!(data.height, None);
        assert_ne!(data.height, Some(String::new()));
    }

    #[test]
    fn field_consumes_exactly_len_plus_two() {
        for len in [0usize, 1, 0x10, 0xFF] {
            let mut buf = format!("{:02X}", len).into_bytes();
            buf.extend_from_slice(&vec![b'X'; len]);
            buf.extend_from_slice(b"tail");
            let (rest, _) = field_value(&buf).unwrap();
            assert_eq!(rest, b"tail", "len {:#04X}", len);
        }
    }

    #[test]
    fn lowercase_length_prefix_parses() {
        let (rest, v) = field_value(b"0fAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(v, Some(&b"AAAAAAAAAAAAAAA"[..]));
        assert!(rest.is_empty());
    }

    #[test]
    fn overrun_fails_for_the_right_field() {
        // Issuer declares 6 bytes but only 3 follow.
        let mut rec = vec![0u8; 6];
        rec.extend_from_slice(b"06MIN");
        assert_eq!(
            decode(&rec).unwrap_err(),
            Error::Decode {
                field: Field::Issuer,
                cause: DecodeCause::Truncated,
            },
        );
    }

    #[test]
    fn record_shorter_than_header_fails() {
        assert_eq!(
            decode(&[0x00; 4]).unwrap_err(),
            Error::Decode {
                field: Field::Issuer,
                cause: DecodeCause::Truncated,
            },
        );
    }

    #[test]
    fn non_hex_length_prefix_fails() {
        let mut rec = vec![0u8; 6];
        rec.extend_from_slice(b"ZZ");
        assert_eq!(
            decode(&rec).unwrap_err(),
            Error::Decode {
                field: Field::Issuer,
                cause: DecodeCause::BadLengthPrefix,
            },
        );
    }

    #[test]
    fn non_ascii_value_fails() {
        let mut rec = vec![0u8; 6];
        rec.extend_from_slice(b"02");
        rec.extend_from_slice(&[0xC3, 0xA8]); // UTF-8 "è", valid UTF-8 but not ASCII
        assert_eq!(
            decode(&rec).unwrap_err(),
            Error::Decode {
                field: Field::Issuer,
                cause: DecodeCause::NotAscii,
            },
        );
    }

    #[test]
    fn short_date_fails() {
        let mut rec = vec![0u8; 6];
        push_field(&mut rec, "MININT");
        push_field(&mut rec, "0101"); // issue date, 4 characters
        assert_eq!(
            decode(&rec).unwrap_err(),
            Error::Decode {
                field: Field::IssueDate,
                cause: DecodeCause::BadDate(4),
            },
        );
    }

    #[test]
    fn no_partial_record_on_failure() {
        // Everything up to the fiscal code is fine; the fiscal code overruns.
        let mut rec = vec![0u8; 6];
        push_field(&mut rec, "MININT");
        push_field(&mut rec, "01012030");
        push_field(&mut rec, "01012036");
        push_field(&mut rec, "ROSSI");
        push_field(&mut rec, "MARIO");
        push_field(&mut rec, "31121980");
        push_field(&mut rec, "M");
        push_field(&mut rec, "");
        rec.extend_from_slice(b"10RSS"); // declares 16, provides 3
        assert_eq!(
            decode(&rec).unwrap_err(),
            Error::Decode {
                field: Field::FiscalCode,
                cause: DecodeCause::Truncated,
            },
        );
    }
}
