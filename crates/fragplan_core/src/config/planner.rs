use std::collections::HashMap;
use std::sync::LazyLock;

use fragplan_error::{DbError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for plan assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub enable_push_down: bool,
    pub enable_truncate_delete: bool,
    pub enable_index_scans: bool,
    /// Zero means no limit.
    pub max_candidate_plans: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            enable_push_down: true,
            enable_truncate_delete: true,
            enable_index_scans: true,
            max_candidate_plans: 0,
        }
    }
}

impl PlannerConfig {
    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();

        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        let value = (func.get)(&def_conf);
        (func.set)(&value, self)
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Names and descriptions of all settings, sorted by name.
    pub fn settings() -> Vec<(&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
            .collect();
        settings.sort_unstable();
        settings
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(value: &str, conf: &mut PlannerConfig) -> Result<()>,
    get: fn(conf: &PlannerConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: PlannerSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: PlannerSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<EnablePushDown>(&mut map);
    insert_setting::<EnableTruncateDelete>(&mut map);
    insert_setting::<EnableIndexScans>(&mut map);
    insert_setting::<MaxCandidatePlans>(&mut map);

    map
});

pub trait PlannerSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()>;
    fn get_as_string(conf: &PlannerConfig) -> String;
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(DbError::new(format!("Invalid value for '{name}'")).with_field("value", value)),
    }
}

pub struct EnablePushDown;

impl PlannerSetting for EnablePushDown {
    const NAME: &'static str = "enable_push_down";
    const DESCRIPTION: &'static str =
        "Allow LIMIT, aggregates and DISTINCT to be executed on every partition";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.enable_push_down = parse_bool(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        conf.enable_push_down.to_string()
    }
}

pub struct EnableTruncateDelete;

impl PlannerSetting for EnableTruncateDelete {
    const NAME: &'static str = "enable_truncate_delete";
    const DESCRIPTION: &'static str =
        "Plan unfiltered single partition deletes as a table truncate";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.enable_truncate_delete = parse_bool(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        conf.enable_truncate_delete.to_string()
    }
}

pub struct EnableIndexScans;

impl PlannerSetting for EnableIndexScans {
    const NAME: &'static str = "enable_index_scans";
    const DESCRIPTION: &'static str = "Propose index scans as candidate access paths";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.enable_index_scans = parse_bool(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        conf.enable_index_scans.to_string()
    }
}

pub struct MaxCandidatePlans;

impl PlannerSetting for MaxCandidatePlans {
    const NAME: &'static str = "max_candidate_plans";
    const DESCRIPTION: &'static str =
        "Maximum number of plans to produce per statement, 0 for no limit";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.max_candidate_plans = value.trim().parse::<u64>()?;
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        conf.max_candidate_plans.to_string()
    }
}
