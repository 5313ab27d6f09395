use crate::img;
use std::str::FromStr;
use super::{BrotherFormat,FormatConfig};

fn parse_f64(obj: &json::JsonValue,name: &str,default: f64) -> Result<f64,img::Error> {
    if obj.is_null() {
        return Ok(default);
    }
    if let Some(val) = obj.as_f64() {
        return Ok(val);
    }
    log::error!("{} should be a number",name);
    return Err(img::Error::MetadataMismatch);
}
fn parse_i32(obj: &json::JsonValue,name: &str,default: i32) -> Result<i32,img::Error> {
    if obj.is_null() {
        return Ok(default);
    }
    if let Some(val) = obj.as_i32() {
        return Ok(val);
    }
    log::error!("{} should be an integer",name);
    return Err(img::Error::MetadataMismatch);
}
fn parse_usize(obj: &json::JsonValue,name: &str,default: usize) -> Result<usize,img::Error> {
    if obj.is_null() {
        return Ok(default);
    }
    if let Some(val) = obj.as_usize() {
        return Ok(val);
    }
    log::error!("{} should be a non-negative integer",name);
    return Err(img::Error::MetadataMismatch);
}
fn parse_str(obj: &json::JsonValue,name: &str,default: &str) -> Result<String,img::Error> {
    if obj.is_null() {
        return Ok(default.to_string());
    }
    if let Some(s) = obj.as_str() {
        return Ok(s.to_string());
    }
    log::error!("{} should be a string",name);
    return Err(img::Error::MetadataMismatch);
}

impl FormatConfig {
    /// Parse a format from JSON.  Only `format` is required, every other key
    /// takes the value from the preset for that format.
    pub fn from_json(json_str: &str) -> Result<Self,img::Error> {
        let obj = match json::parse(json_str) {
            Ok(obj) => obj,
            Err(e) => {
                log::error!("could not parse format: {}",e);
                return Err(img::Error::MetadataMismatch);
            }
        };
        if !obj.is_object() {
            log::error!("format should be a JSON object");
            return Err(img::Error::MetadataMismatch);
        }
        let format = match obj["format"].as_str() {
            Some(s) => BrotherFormat::from_str(s)?,
            None => {
                log::error!("format key is missing or not a string");
                return Err(img::Error::MetadataMismatch);
            }
        };
        let preset = FormatConfig::from_format(format);
        let ans = Self {
            format,
            clock_rate_us: parse_f64(&obj["clock_rate_us"],"clock_rate_us",preset.clock_rate_us)?,
            bias: parse_i32(&obj["bias"],"bias",preset.bias)?,
            sector_skew: parse_str(&obj["sector_skew"],"sector_skew",&preset.sector_skew)?,
            sectors_per_track: parse_usize(&obj["sectors_per_track"],"sectors_per_track",preset.sectors_per_track)?,
            post_index_gap_ms: parse_f64(&obj["post_index_gap_ms"],"post_index_gap_ms",preset.post_index_gap_ms)?,
            sector_spacing_ms: parse_f64(&obj["sector_spacing_ms"],"sector_spacing_ms",preset.sector_spacing_ms)?,
            post_header_spacing_ms: parse_f64(&obj["post_header_spacing_ms"],"post_header_spacing_ms",preset.post_header_spacing_ms)?,
            revolution_ms: parse_f64(&obj["revolution_ms"],"revolution_ms",preset.revolution_ms)?
        };
        ans.validate()?;
        Ok(ans)
    }
    pub fn to_json(&self,indent: Option<u16>) -> String {
        let mut root = json::JsonValue::new_object();
        root["format"] = json::JsonValue::String(self.format.to_string());
        root["clock_rate_us"] = self.clock_rate_us.into();
        root["bias"] = self.bias.into();
        root["sector_skew"] = json::JsonValue::String(self.sector_skew.clone());
        root["sectors_per_track"] = self.sectors_per_track.into();
        root["post_index_gap_ms"] = self.post_index_gap_ms.into();
        root["sector_spacing_ms"] = self.sector_spacing_ms.into();
        root["post_header_spacing_ms"] = self.post_header_spacing_ms.into();
        root["revolution_ms"] = self.revolution_ms.into();
        match indent {
            Some(spaces) => json::stringify_pretty(root,spaces),
            None => json::stringify(root)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let cfg = FormatConfig::from_json(r#"{"format":"brother120","bias":2}"#).expect("parse failed");
        let mut expected = FormatConfig::brother_120();
        expected.bias = 2;
        assert_eq!(cfg,expected);
    }

    #[test]
    fn json_both_ways() {
        let mut cfg = FormatConfig::brother_240();
        cfg.sector_skew = "0123456789ab".to_string();
        cfg.sector_spacing_ms = 15.5;
        let s = cfg.to_json(Some(2));
        let back = FormatConfig::from_json(&s).expect("parse failed");
        assert_eq!(back.format,cfg.format);
        assert_eq!(back.sector_skew,cfg.sector_skew);
        assert_eq!(back.sectors_per_track,12);
        assert!((back.sector_spacing_ms - 15.5).abs() < 1e-9);
        assert!((back.clock_rate_us - 3.83).abs() < 1e-9);
        assert!((back.post_header_spacing_ms - 0.69).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(FormatConfig::from_json(r#"{"bias":2}"#),Err(img::Error::MetadataMismatch));
        assert_eq!(FormatConfig::from_json(r#"{"format":"brother360"}"#),Err(img::Error::BadFormat));
        assert_eq!(FormatConfig::from_json(r#"{"format":"brother240","clock_rate_us":"fast"}"#),Err(img::Error::MetadataMismatch));
        assert_eq!(FormatConfig::from_json(r#"{"format":"brother240","sector_skew":"05a3816b492#"}"#),Err(img::Error::BadSkew));
        assert_eq!(FormatConfig::from_json("not json"),Err(img::Error::MetadataMismatch));
    }
}
