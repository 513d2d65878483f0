//! Per-profile global policy flags.

use crate::codec::icmp::{decode_icmp_types, encode_icmp_types, IcmpTypeCode};
use crate::native::NativeProfileSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Policy flags of one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub firewall_enabled: bool,
    /// Ignore every application, port and service exception.
    pub exceptions_not_allowed: bool,
    pub notifications_disabled: bool,
    pub unicast_responses_disabled: bool,
    /// Empty means unspecified, not "nothing allowed".
    pub allowed_icmp_types: BTreeSet<IcmpTypeCode>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self::from(&NativeProfileSettings::default())
    }
}

impl From<&NativeProfileSettings> for ProfileSettings {
    fn from(native: &NativeProfileSettings) -> Self {
        Self {
            firewall_enabled: native.firewall_enabled,
            exceptions_not_allowed: native.exceptions_not_allowed,
            notifications_disabled: native.notifications_disabled,
            unicast_responses_disabled: native.unicast_responses_disabled,
            allowed_icmp_types: decode_icmp_types(native.allowed_icmp_types.as_deref()),
        }
    }
}

impl From<&ProfileSettings> for NativeProfileSettings {
    fn from(settings: &ProfileSettings) -> Self {
        Self {
            firewall_enabled: settings.firewall_enabled,
            exceptions_not_allowed: settings.exceptions_not_allowed,
            notifications_disabled: settings.notifications_disabled,
            unicast_responses_disabled: settings.unicast_responses_disabled,
            allowed_icmp_types: encode_icmp_types(&settings.allowed_icmp_types),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProfileSettings;
    use crate::codec::icmp::IcmpTypeCode;
    use crate::native::NativeProfileSettings;

    #[test]
    fn empty_icmp_set_maps_to_absent_text() {
        let settings = ProfileSettings::default();
        assert!(settings.firewall_enabled);
        assert!(settings.allowed_icmp_types.is_empty());
        assert_eq!(NativeProfileSettings::from(&settings).allowed_icmp_types, None);
    }

    #[test]
    fn icmp_text_is_decoded_into_the_set() {
        let native = NativeProfileSettings {
            allowed_icmp_types: Some("8,3:4,bogus".to_string()),
            ..NativeProfileSettings::default()
        };
        let settings = ProfileSettings::from(&native);
        assert!(settings
            .allowed_icmp_types
            .contains(&IcmpTypeCode::any_code(8)));
        assert!(settings
            .allowed_icmp_types
            .contains(&IcmpTypeCode::exact(3, 4)));
        assert_eq!(settings.allowed_icmp_types.len(), 2);
    }
}
