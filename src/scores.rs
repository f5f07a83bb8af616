use serde::{
   Deserialize,
   Serialize,
};

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_SCORE: i64 = 1_000_000;

/// Body of a score submission as the client sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScore {
   pub player_name: Option<String>,
   pub score:       Option<LenientInt>,
   pub level:       Option<LenientInt>,
   pub timestamp:   Option<LenientInt>,
}

/// A numeric field as browser clients send it: an integer, a float or a
/// numeric string. `integer` is read like `parseInt`: leading digits of a
/// string, or a float truncated toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RawNumber")]
pub struct LenientInt {
   /// The number as sent, NaN when it is not numeric. Range checks use this.
   value:   f64,
   integer: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
   Int(i64),
   Float(f64),
   Text(String),
}

impl From<RawNumber> for LenientInt {
   fn from(raw: RawNumber) -> Self {
      match raw {
         RawNumber::Int(n) => n.into(),
         RawNumber::Float(f) => Self {
            value:   f,
            integer: f.is_finite().then(|| f.trunc() as i64),
         },
         RawNumber::Text(s) => Self {
            value:   s.trim().parse().unwrap_or(f64::NAN),
            integer: leading_integer(&s),
         },
      }
   }
}

impl From<i64> for LenientInt {
   fn from(n: i64) -> Self {
      Self {
         value:   n as f64,
         integer: Some(n),
      }
   }
}

/// Optional sign followed by ASCII digits, after leading whitespace.
fn leading_integer(s: &str) -> Option<i64> {
   let s = s.trim_start();
   let (negative, digits) = match s.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, s.strip_prefix('+').unwrap_or(s)),
   };
   let end = digits
      .find(|c: char| !c.is_ascii_digit())
      .unwrap_or(digits.len());
   let n: i64 = digits[..end].parse().ok()?;
   Some(if negative { -n } else { n })
}

/// A submission that passed validation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
   pub player_name: String,
   pub score:       i64,
   pub level:       i64,
   pub timestamp:   Option<i64>,
}

/// A leaderboard row as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
   pub player_name: String,
   pub score:       i64,
   pub level:       i64,
   pub timestamp:   i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
   MissingFields,
   InvalidScore,
}

impl ValidationError {
   pub fn message(self) -> &'static str {
      match self {
         ValidationError::MissingFields => "Missing required fields",
         ValidationError::InvalidScore => "Invalid score",
      }
   }
}

impl SubmitScore {
   pub fn validate(self) -> Result<NewScore, ValidationError> {
      let name = self
         .player_name
         .as_deref()
         .map(str::trim)
         .filter(|name| !name.is_empty());

      // A level of 0 counts as missing, same as an absent one.
      let level = self.level.and_then(|l| l.integer).filter(|&l| l != 0);
      let (Some(name), Some(score), Some(level)) = (name, self.score, level) else {
         return Err(ValidationError::MissingFields);
      };

      // Bounds apply to the number as sent, before truncation.
      if score.value < 0.0 || score.value > MAX_SCORE as f64 {
         return Err(ValidationError::InvalidScore);
      }
      let Some(score) = score.integer.filter(|s| (0..=MAX_SCORE).contains(s)) else {
         return Err(ValidationError::InvalidScore);
      };

      Ok(NewScore {
         player_name: sanitize_name(name),
         score,
         level,
         // 0 or a non-numeric timestamp means "let the server assign one".
         timestamp: self.timestamp.and_then(|t| t.integer).filter(|&t| t != 0),
      })
   }
}

/// Trim and cut to at most `MAX_NAME_CHARS` characters.
pub fn sanitize_name(name: &str) -> String {
   name.trim().chars().take(MAX_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
   use super::*;

   fn submission(name: Option<&str>, score: Option<i64>, level: Option<i64>) -> SubmitScore {
      SubmitScore {
         player_name: name.map(str::to_owned),
         score:       score.map(LenientInt::from),
         level:       level.map(LenientInt::from),
         timestamp:   None,
      }
   }

   #[test]
   fn accepts_valid_submission() {
      let score = submission(Some("  ada  "), Some(1200), Some(3)).validate().unwrap();
      assert_eq!(score, NewScore {
         player_name: "ada".into(),
         score:       1200,
         level:       3,
         timestamp:   None,
      });
   }

   #[test]
   fn missing_or_blank_fields_are_rejected() {
      let cases = [
         submission(None, Some(1), Some(1)),
         submission(Some("   "), Some(1), Some(1)),
         submission(Some("ada"), None, Some(1)),
         submission(Some("ada"), Some(1), None),
         submission(Some("ada"), Some(1), Some(0)),
      ];
      for case in cases {
         assert_eq!(case.validate(), Err(ValidationError::MissingFields));
      }
   }

   #[test]
   fn score_bounds_are_inclusive() {
      assert!(submission(Some("a"), Some(0), Some(1)).validate().is_ok());
      assert!(submission(Some("a"), Some(MAX_SCORE), Some(1)).validate().is_ok());
      assert_eq!(
         submission(Some("a"), Some(-1), Some(1)).validate(),
         Err(ValidationError::InvalidScore)
      );
      assert_eq!(
         submission(Some("a"), Some(MAX_SCORE + 1), Some(1)).validate(),
         Err(ValidationError::InvalidScore)
      );
   }

   #[test]
   fn name_is_cut_by_characters_not_bytes() {
      let name = "ÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅÅ";
      let cut = sanitize_name(name);
      assert_eq!(cut.chars().count(), MAX_NAME_CHARS);
      assert_eq!(sanitize_name("  a very long player name indeed "), "a very long player n");
   }

   #[test]
   fn client_timestamp_is_kept() {
      let mut body = submission(Some("ada"), Some(5), Some(2));
      body.timestamp = Some(LenientInt::from(1_700_000_000_000));
      assert_eq!(body.validate().unwrap().timestamp, Some(1_700_000_000_000));
   }

   #[test]
   fn deserializes_camel_case_body() {
      let body: SubmitScore =
         serde_json::from_str(r#"{"playerName":"ada","score":10,"level":2}"#).unwrap();
      assert_eq!(body.player_name.as_deref(), Some("ada"));
      assert_eq!(body.score, Some(LenientInt::from(10)));
      assert_eq!(body.level, Some(LenientInt::from(2)));
      assert_eq!(body.timestamp, None);
   }

   fn parse(body: &str) -> SubmitScore {
      serde_json::from_str(body).unwrap()
   }

   #[test]
   fn numeric_strings_and_floats_are_read_like_parse_int() {
      let entry = parse(r#"{"playerName":"ada","score":"500","level":"2"}"#)
         .validate()
         .unwrap();
      assert_eq!((entry.score, entry.level), (500, 2));

      let entry = parse(r#"{"playerName":"ada","score":12.5,"level":3.9}"#)
         .validate()
         .unwrap();
      assert_eq!((entry.score, entry.level), (12, 3));

      let entry = parse(r#"{"playerName":"ada","score":" 42 points","level":1}"#)
         .validate()
         .unwrap();
      assert_eq!(entry.score, 42);
   }

   #[test]
   fn bounds_are_checked_before_truncation() {
      for score in ["-0.5", "1000000.5", r#""-3""#, r#""abc""#, "1e20"] {
         let body = format!(r#"{{"playerName":"ada","score":{score},"level":1}}"#);
         assert_eq!(parse(&body).validate(), Err(ValidationError::InvalidScore), "{score}");
      }
      let entry = parse(r#"{"playerName":"ada","score":999999.9,"level":1}"#)
         .validate()
         .unwrap();
      assert_eq!(entry.score, 999_999);
   }

   #[test]
   fn non_numeric_level_counts_as_missing() {
      for level in [r#""none""#, r#""0""#, "0.4", "null"] {
         let body = format!(r#"{{"playerName":"ada","score":1,"level":{level}}}"#);
         assert_eq!(parse(&body).validate(), Err(ValidationError::MissingFields), "{level}");
      }
   }

   #[test]
   fn falsy_or_unreadable_timestamp_is_server_assigned() {
      for timestamp in ["0", r#""""#, r#""soon""#, "null"] {
         let body = format!(r#"{{"playerName":"ada","score":1,"level":1,"timestamp":{timestamp}}}"#);
         assert_eq!(parse(&body).validate().unwrap().timestamp, None, "{timestamp}");
      }
      let entry = parse(r#"{"playerName":"ada","score":1,"level":1,"timestamp":"1700000000000"}"#)
         .validate()
         .unwrap();
      assert_eq!(entry.timestamp, Some(1_700_000_000_000));
   }

   #[test]
   fn leading_integer_matches_parse_int_prefix_rules() {
      assert_eq!(leading_integer("  -17abc"), Some(-17));
      assert_eq!(leading_integer("+8"), Some(8));
      assert_eq!(leading_integer("3.99"), Some(3));
      assert_eq!(leading_integer("abc"), None);
      assert_eq!(leading_integer("-"), None);
      assert_eq!(leading_integer(""), None);
   }
}
