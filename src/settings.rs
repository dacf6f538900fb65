//! Actor settings read from the coupling runtime.

use crate::coupling::{CouplingInstance, SettingValue};
use crate::error::SettingsError;

/// Setting holding the minimum spacing between gated exchanges.
pub const EQUILIBRIUM_INTERVAL: &str = "equilibrium_interval";
/// Setting enabling full-history output.
pub const OUTPUT_ALL_TIMESLICES: &str = "output_all_timeslices";
/// Setting holding the path of the simulation configuration.
pub const CONFIG_SOURCE: &str = "config_source";

/// Default gate interval: small enough to let every step through.
pub const DEFAULT_EQUILIBRIUM_INTERVAL: f64 = 1e-6;

/// Conversion from a raw setting value.
pub trait FromSetting: Sized {
    /// Name of the expected type, for error messages.
    const EXPECTED: &'static str;

    /// Converts the value, or returns `None` on a type mismatch.
    fn from_setting(value: &SettingValue) -> Option<Self>;
}

impl FromSetting for f64 {
    const EXPECTED: &'static str = "float";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromSetting for bool {
    const EXPECTED: &'static str = "bool";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromSetting for String {
    const EXPECTED: &'static str = "string";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

/// Reads a required setting.
pub fn get_setting<T: FromSetting, I: CouplingInstance + ?Sized>(
    instance: &I,
    name: &str,
) -> Result<T, SettingsError> {
    let value = instance.get_setting(name).ok_or_else(|| SettingsError::Missing {
        name: name.to_string(),
    })?;
    T::from_setting(&value).ok_or_else(|| SettingsError::WrongType {
        name: name.to_string(),
        expected: T::EXPECTED,
    })
}

/// Reads an optional setting, falling back to `default` when it is absent.
///
/// A present setting of the wrong type is still an error.
pub fn get_setting_or<T: FromSetting, I: CouplingInstance + ?Sized>(
    instance: &I,
    name: &str,
    default: T,
) -> Result<T, SettingsError> {
    match instance.get_setting(name) {
        None => Ok(default),
        Some(value) => T::from_setting(&value).ok_or_else(|| SettingsError::WrongType {
            name: name.to_string(),
            expected: T::EXPECTED,
        }),
    }
}

/// Settings consumed by the actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSettings {
    /// Minimum simulation-time spacing between gated exchanges.
    pub equilibrium_interval: f64,
    /// Whether every time slice is accumulated and sent at the end.
    pub output_all_timeslices: bool,
    /// Path of the simulation configuration.
    pub config_source: String,
}

impl ActorSettings {
    /// Reads and validates the actor settings.
    ///
    /// # Errors
    ///
    /// Fails if `config_source` is missing, a setting has the wrong type, or
    /// the interval is negative or not finite.
    pub fn from_instance<I: CouplingInstance + ?Sized>(instance: &I) -> Result<Self, SettingsError> {
        let equilibrium_interval =
            get_setting_or(instance, EQUILIBRIUM_INTERVAL, DEFAULT_EQUILIBRIUM_INTERVAL)?;
        if !equilibrium_interval.is_finite() || equilibrium_interval < 0.0 {
            return Err(SettingsError::InvalidValue {
                name: EQUILIBRIUM_INTERVAL.to_string(),
                reason: format!("must be a finite value >= 0, got {equilibrium_interval}"),
            });
        }
        let output_all_timeslices = get_setting_or(instance, OUTPUT_ALL_TIMESLICES, false)?;
        let config_source: String = get_setting(instance, CONFIG_SOURCE)?;

        Ok(Self {
            equilibrium_interval,
            output_all_timeslices,
            config_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::Topology;
    use crate::ports::Operator;

    fn instance_with(settings: &[(&str, SettingValue)]) -> crate::coupling::LoopbackInstance {
        let mut topology = Topology::new().component("actor", [(Operator::OF, vec!["out"])]);
        for (name, value) in settings {
            topology = topology.setting(*name, value.clone());
        }
        topology.build().unwrap().remove("actor").unwrap()
    }

    #[test]
    fn defaults_apply_when_optional_settings_absent() {
        let instance = instance_with(&[(CONFIG_SOURCE, "sim.json".into())]);
        let settings = ActorSettings::from_instance(&instance).unwrap();
        assert_eq!(settings.equilibrium_interval, DEFAULT_EQUILIBRIUM_INTERVAL);
        assert!(!settings.output_all_timeslices);
        assert_eq!(settings.config_source, "sim.json");
    }

    #[test]
    fn integer_interval_is_widened() {
        let instance = instance_with(&[
            (CONFIG_SOURCE, "sim.json".into()),
            (EQUILIBRIUM_INTERVAL, SettingValue::Int(2)),
            (OUTPUT_ALL_TIMESLICES, true.into()),
        ]);
        let settings = ActorSettings::from_instance(&instance).unwrap();
        assert_eq!(settings.equilibrium_interval, 2.0);
        assert!(settings.output_all_timeslices);
    }

    #[test]
    fn missing_config_source_is_an_error() {
        let instance = instance_with(&[]);
        let err = ActorSettings::from_instance(&instance).unwrap_err();
        assert!(matches!(err, SettingsError::Missing { .. }));
    }

    #[test]
    fn wrong_type_and_negative_interval_are_errors() {
        let instance = instance_with(&[
            (CONFIG_SOURCE, "sim.json".into()),
            (OUTPUT_ALL_TIMESLICES, "yes".into()),
        ]);
        assert!(matches!(
            ActorSettings::from_instance(&instance).unwrap_err(),
            SettingsError::WrongType { expected: "bool", .. }
        ));

        let instance = instance_with(&[
            (CONFIG_SOURCE, "sim.json".into()),
            (EQUILIBRIUM_INTERVAL, (-1.0).into()),
        ]);
        assert!(matches!(
            ActorSettings::from_instance(&instance).unwrap_err(),
            SettingsError::InvalidValue { .. }
        ));
    }
}
