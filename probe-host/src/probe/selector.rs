use std::fmt;

use crate::probe::DebugProbeInfo;

/// Selects one connected probe.
///
/// Construct this from a [`DebugProbeInfo`] or from a string in the format
/// `VID:PID:SERIALNUMBER`. VID and PID are parsed as hexadecimal numbers, the
/// serial number is optional.
///
/// If the serial number part is present but empty, only probes without a
/// serial number (or with an empty one) are selected.
///
/// ## Example:
///
/// ```
/// let selector: probe_host::DebugProbeSelector = "1942:1337:SERIAL".parse().unwrap();
///
/// assert_eq!(selector.vendor_id, 0x1942);
/// assert_eq!(selector.product_id, 0x1337);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugProbeSelector {
    /// The USB vendor id of the debug probe to be used.
    pub vendor_id: u16,
    /// The USB product id of the debug probe to be used.
    pub product_id: u16,
    /// The serial number of the debug probe to be used.
    pub serial_number: Option<String>,
}

impl DebugProbeSelector {
    /// Check if the given probe info matches this selector.
    pub fn matches_probe(&self, info: &DebugProbeInfo) -> bool {
        self.match_probe_selector(
            info.vendor_id,
            info.product_id,
            info.serial_number.as_deref(),
        )
    }

    fn match_probe_selector(
        &self,
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<&str>,
    ) -> bool {
        tracing::trace!(
            "Matching probe selector {self} against {vendor_id:04x}:{product_id:04x}:{serial_number:?}"
        );

        vendor_id == self.vendor_id
            && product_id == self.product_id
            && self
                .serial_number
                .as_ref()
                .map(|s| match serial_number {
                    Some(serial_number) => serial_number == s,
                    None => s.is_empty(),
                })
                .unwrap_or(true)
    }
}

impl std::str::FromStr for DebugProbeSelector {
    type Err = DebugProbeSelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Serial numbers may contain colons themselves (MAC addresses).
        let mut split = s.trim().splitn(3, ':');

        let vendor_id = split.next().ok_or(DebugProbeSelectorParseError::Format)?;
        let product_id = split.next().ok_or(DebugProbeSelectorParseError::Format)?;
        let serial_number = split.next().map(|s| s.to_string());

        Ok(DebugProbeSelector {
            vendor_id: u16::from_str_radix(vendor_id, 16)?,
            product_id: u16::from_str_radix(product_id, 16)?,
            serial_number,
        })
    }
}

impl TryFrom<&str> for DebugProbeSelector {
    type Error = DebugProbeSelectorParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DebugProbeInfo> for DebugProbeSelector {
    fn from(info: DebugProbeInfo) -> Self {
        DebugProbeSelector {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            serial_number: info.serial_number,
        }
    }
}

impl From<&DebugProbeInfo> for DebugProbeSelector {
    fn from(info: &DebugProbeInfo) -> Self {
        DebugProbeSelector {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            serial_number: info.serial_number.clone(),
        }
    }
}

impl fmt::Display for DebugProbeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(ref sn) = self.serial_number {
            write!(f, ":{sn}")?;
        }
        Ok(())
    }
}

/// An error which can occur while parsing a [`DebugProbeSelector`].
#[derive(thiserror::Error, Debug, docsplay::Display)]
pub enum DebugProbeSelectorParseError {
    /// Could not parse VID or PID: {0}
    ParseInt(#[from] std::num::ParseIntError),

    /// The format of the selector is invalid. Please use a string in the form `VID:PID:<Serial>`, where Serial is optional.
    Format,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::probe::DebugProbeType;

    #[test]
    fn parsing_many_colons() {
        let selector: DebugProbeSelector = "303a:1001:DC:DA:0C:D3:FE:D8".parse().unwrap();

        assert_eq!(selector.vendor_id, 0x303a);
        assert_eq!(selector.product_id, 0x1001);
        assert_eq!(
            selector.serial_number,
            Some("DC:DA:0C:D3:FE:D8".to_string())
        );
    }

    #[test]
    fn missing_serial_is_none() {
        let selector: DebugProbeSelector = "303a:1001".parse().unwrap();

        assert_eq!(selector.serial_number, None);
        assert!(selector.match_probe_selector(0x303a, 0x1001, None));
        assert!(selector.match_probe_selector(0x303a, 0x1001, Some("serial")));
    }

    #[test]
    fn empty_serial_is_some() {
        let selector: DebugProbeSelector = "303a:1001:".parse().unwrap();

        assert_eq!(selector.serial_number, Some(String::new()));
        assert!(selector.match_probe_selector(0x303a, 0x1001, None));
        assert!(!selector.match_probe_selector(0x303a, 0x1001, Some("serial")));
    }

    #[test]
    fn invalid_selectors() {
        assert!(matches!(
            "0d28".parse::<DebugProbeSelector>(),
            Err(DebugProbeSelectorParseError::Format)
        ));
        assert!(matches!(
            "xyz:0204".parse::<DebugProbeSelector>(),
            Err(DebugProbeSelectorParseError::ParseInt(_))
        ));
    }

    #[test]
    fn selector_from_info_round_trips() {
        let info = DebugProbeInfo::new(
            "DAPLink",
            0x0d28,
            0x0204,
            Some("0240000034544e45".to_string()),
            DebugProbeType::CmsisDap,
        );
        let selector = DebugProbeSelector::from(&info);

        assert_eq!(selector.to_string(), "0d28:0204:0240000034544e45");
        assert!(selector.matches_probe(&info));
        assert_eq!(selector.to_string().parse::<DebugProbeSelector>().unwrap(), selector);
    }
}
