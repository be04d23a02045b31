//! Cookie header codec

use std::{borrow::Cow, collections::HashMap, fmt, str::FromStr};

use itertools::Itertools;
use percent_encoding::percent_decode_str;

use crate::request::Headers;

/// Source: https://httpwg.org/specs/rfc6265.html#sane-set-cookie-syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
  Strict,
  Lax,
  None
}

impl fmt::Display for SameSite {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SameSite::Strict => "Strict",
      SameSite::Lax => "Lax",
      SameSite::None => "None"
    })
  }
}

impl FromStr for SameSite {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "strict" => Ok(SameSite::Strict),
      "lax" => Ok(SameSite::Lax),
      "none" => Ok(SameSite::None),
      _ => Err(())
    }
  }
}

/// Attributes appended after `HttpOnly`, which is always set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieAttributes {
  pub secure: bool,
  pub same_site: Option<SameSite>,
  pub max_age: Option<u64>,
  pub path: Option<String>
}

/// Parses a `Cookie` header into a name to value map. Values are
/// percent-decoded. Segments without a name or a value are dropped and a
/// repeated name keeps its last value.
pub fn parse(header: &str) -> HashMap<String, String> {
  header.split(';')
    .filter_map(|cookie| {
      // only the first `=` separates, base64 padding stays in the value
      let (name, value) = cookie.split_once('=')
        .unwrap_or((cookie, ""));
      let (name, value) = (name.trim(), value.trim());

      if name.is_empty() || value.is_empty() {
        return None
      }

      Some((name.to_string(), decode(value).into_owned()))
    })
    .collect()
}

fn decode(value: &str) -> Cow<'_, str> {
  percent_decode_str(value)
    .decode_utf8()
    // keep undecodable values as they were sent
    .unwrap_or(Cow::Borrowed(value))
}

/// Value of the cookie `name`, read from the first `Cookie` header only
pub fn from_headers(headers: &Headers, name: &str) -> Option<String> {
  headers.first("cookie")
    .map(parse)
    .and_then(|mut cookies| cookies.remove(name))
}

/// `Set-Cookie` value for `name`
pub fn serialize(name: &str, value: &str, attributes: &CookieAttributes) -> String {
  let CookieAttributes { secure, same_site, max_age, path } = attributes;

  let flags = ["HttpOnly".to_string()].into_iter()
    .chain(secure.then(|| "Secure".to_string()))
    .chain(same_site.map(|s| format!("SameSite={s}")))
    .chain(max_age.map(|age| format!("Max-Age={age}")))
    .chain(path.as_ref().map(|path| format!("Path={path}")))
    .join("; ");

  format!("{name}={value}; {flags}")
}

/// `Set-Cookie` value that removes `name` from the browser
pub fn expired(name: &str, attributes: &CookieAttributes) -> String {
  serialize(
    name,
    "",
    &CookieAttributes {
      max_age: Some(0),
      ..attributes.clone()
    }
  )
}
