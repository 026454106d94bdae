use std::fmt;

pub const DEFAULT_RADAR: &str = "RADAR001";
pub const DEFAULT_GROUP: &str = "RAINBOW";
pub const DEFAULT_LEVEL: &str = "l0";

/// Data groups holding model or terrain data rather than sensor readings.
const AUXILIARY_GROUPS: [&str; 4] = ["COSMO", "RAD4ALPCOSMO", "DEM", "RAD4ALPDEM"];

/// Data group of intermediate products handed between datasets.
const PROC_GROUP: &str = "PROC";

/// Parsed `[RADARnnn:][group:]datatype[,dataset,product]` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataTypeDescriptor {
    pub radar: String,
    pub group: String,
    pub datatype: String,
    pub dataset: Option<String>,
    pub product: Option<String>,
}

impl DataTypeDescriptor {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (radar, remainder) = match raw.split_once(':') {
            Some((head, tail)) if is_radar_id(head) => (head, tail),
            _ => (DEFAULT_RADAR, raw),
        };
        let (group, rest) = remainder
            .split_once(':')
            .unwrap_or((DEFAULT_GROUP, remainder));

        let mut pieces = rest.split(',').map(str::trim);
        let datatype = pieces.next().unwrap_or_default().to_string();
        let dataset = pieces.next().filter(|s| !s.is_empty()).map(str::to_string);
        let product = pieces.next().filter(|s| !s.is_empty()).map(str::to_string);

        Self {
            radar: radar.to_string(),
            group: group.to_string(),
            datatype,
            dataset,
            product,
        }
    }

    /// True for forecast/terrain groups that cannot drive the master clock.
    pub fn is_auxiliary(&self) -> bool {
        AUXILIARY_GROUPS.contains(&self.group.as_str())
    }

    pub fn is_intermediate(&self) -> bool {
        self.group == PROC_GROUP
    }

    /// 1-based number parsed from the `RADARnnn` identifier.
    pub fn radar_number(&self) -> Option<usize> {
        self.radar
            .strip_prefix("RADAR")
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|n| *n > 0)
    }

    pub fn source_index(&self) -> Option<usize> {
        self.radar_number().map(|n| n - 1)
    }
}

impl fmt::Display for DataTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.radar, self.group, self.datatype)?;
        if let (Some(dataset), Some(product)) = (&self.dataset, &self.product) {
            write!(f, ",{dataset},{product}")?;
        }
        Ok(())
    }
}

fn is_radar_id(token: &str) -> bool {
    token
        .strip_prefix("RADAR")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// `RADARnnn` identifier for a 0-based source index.
pub fn radar_id(source_index: usize) -> String {
    format!("RADAR{:03}", source_index + 1)
}

/// Splits a `level:name` dataset descriptor. Bare names land on `l0`.
pub fn parse_dataset_descriptor(raw: &str) -> (String, String) {
    match raw.trim().split_once(':') {
        Some((level, name)) => (level.trim().to_string(), name.trim().to_string()),
        None => (DEFAULT_LEVEL.to_string(), raw.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let d = DataTypeDescriptor::parse("RADAR002:CFRADIAL:dBZc,echoFilter,SAVEVOL");
        assert_eq!(d.radar, "RADAR002");
        assert_eq!(d.group, "CFRADIAL");
        assert_eq!(d.datatype, "dBZc");
        assert_eq!(d.dataset.as_deref(), Some("echoFilter"));
        assert_eq!(d.product.as_deref(), Some("SAVEVOL"));
        assert_eq!(d.source_index(), Some(1));
        assert_eq!(d.to_string(), "RADAR002:CFRADIAL:dBZc,echoFilter,SAVEVOL");
    }

    #[test]
    fn fills_default_radar_and_group() {
        let d = DataTypeDescriptor::parse("dBZ");
        assert_eq!(d.to_string(), "RADAR001:RAINBOW:dBZ");
        let d = DataTypeDescriptor::parse("COSMO:TEMP");
        assert_eq!(d.radar, DEFAULT_RADAR);
        assert!(d.is_auxiliary());
    }

    #[test]
    fn parses_radar_prefix_without_group() {
        let d = DataTypeDescriptor::parse("RADAR002:dBZ");
        assert_eq!(d.radar, "RADAR002");
        assert_eq!(d.group, DEFAULT_GROUP);
        assert_eq!(d.datatype, "dBZ");
        assert_eq!(d.source_index(), Some(1));

        let d = DataTypeDescriptor::parse("RADAR003:ZDR,hydro,SAVEVOL");
        assert_eq!(d.to_string(), "RADAR003:RAINBOW:ZDR,hydro,SAVEVOL");
    }

    #[test]
    fn group_prefix_is_not_mistaken_for_radar() {
        let d = DataTypeDescriptor::parse("PROC:dBZ_masked");
        assert_eq!(d.radar, DEFAULT_RADAR);
        assert!(d.is_intermediate());

        let d = DataTypeDescriptor::parse("RADARX:dBZ");
        assert_eq!(d.radar, DEFAULT_RADAR);
        assert_eq!(d.group, "RADARX");
    }

    #[test]
    fn dataset_descriptor_defaults_to_l0() {
        assert_eq!(
            parse_dataset_descriptor("l2:hydro"),
            ("l2".to_string(), "hydro".to_string())
        );
        assert_eq!(
            parse_dataset_descriptor("hydro"),
            ("l0".to_string(), "hydro".to_string())
        );
    }
}
