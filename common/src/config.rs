use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub imp_byte_timeout_ms: u64,
    pub xbee_byte_timeout_ms: u64,
    pub mux_settle_ms: u64,
    /// Most bytes discarded while hunting for the Imp magic in one pass.
    pub sync_scan_limit: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            imp_byte_timeout_ms: 10,
            xbee_byte_timeout_ms: 40,
            mux_settle_ms: 5,
            sync_scan_limit: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub pass_delay_ms: u64,
    pub blink_period_passes: u8,
    pub corruption_notice_ms: u64,
    pub button_release_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            pass_delay_ms: 50,
            blink_period_passes: 4,
            corruption_notice_ms: 2_000,
            button_release_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub control: LoopConfig,
}

impl LinkConfig {
    pub fn sanitize(&mut self) {
        self.imp_byte_timeout_ms = self.imp_byte_timeout_ms.clamp(1, 1_000);
        self.xbee_byte_timeout_ms = self.xbee_byte_timeout_ms.clamp(1, 1_000);
        self.mux_settle_ms = self.mux_settle_ms.min(100);
        self.sync_scan_limit = self.sync_scan_limit.clamp(2, 64);
    }
}

impl LoopConfig {
    pub fn sanitize(&mut self) {
        self.pass_delay_ms = self.pass_delay_ms.min(1_000);

        let period = self.blink_period_passes.clamp(2, 32);
        self.blink_period_passes = if period % 2 == 0 { period } else { period - 1 };

        self.corruption_notice_ms = self.corruption_notice_ms.min(60_000);
        self.button_release_timeout_ms = self.button_release_timeout_ms.clamp(10, 60_000);
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.link.sanitize();
        self.control.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_defaults() {
        let mut config = RuntimeConfig::default();
        config.sanitize();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn sanitize_clamps_degenerate_values() {
        let mut config = RuntimeConfig::default();
        config.link.imp_byte_timeout_ms = 0;
        config.link.sync_scan_limit = 0;
        config.control.blink_period_passes = 7;
        config.control.button_release_timeout_ms = 0;

        config.sanitize();

        assert_eq!(config.link.imp_byte_timeout_ms, 1);
        assert_eq!(config.link.sync_scan_limit, 2);
        assert_eq!(config.control.blink_period_passes, 6);
        assert_eq!(config.control.button_release_timeout_ms, 10);
    }

    #[test]
    fn missing_control_section_uses_defaults() {
        let raw = r#"{"link":{"imp_byte_timeout_ms":20,"xbee_byte_timeout_ms":40,"mux_settle_ms":5,"sync_scan_limit":8}}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.link.imp_byte_timeout_ms, 20);
        assert_eq!(config.control, LoopConfig::default());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let raw = r#"{"control":{"pass_delay_ms":20}}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.link, LinkConfig::default());
        assert_eq!(config.control.pass_delay_ms, 20);
        assert_eq!(config.control.blink_period_passes, 4);

        let empty: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RuntimeConfig::default());
    }
}
