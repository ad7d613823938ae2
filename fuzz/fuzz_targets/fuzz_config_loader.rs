#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<yag_config::Config>(data) {
        if cfg.validate().is_ok() {
            let _ = yag_core::conversions::initial_settings(&cfg.setting);
            let _ = yag_core::PollCfg::try_from(&cfg.setting);
        }
    }
});
