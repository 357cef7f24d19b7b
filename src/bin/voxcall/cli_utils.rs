use anyhow::Result;
use std::env;
use voxcall::audio;

/// Device names from `VOXCALL_TEST_DEVICES` (comma separated) or the host.
pub(crate) fn input_device_names() -> Vec<String> {
    match env::var("VOXCALL_TEST_DEVICES") {
        Ok(raw) => parse_device_list(&raw),
        Err(_) => audio::Recorder::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err:#}");
            Vec::new()
        }),
    }
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = input_device_names();
    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_list_skips_blanks() {
        assert_eq!(
            parse_device_list(" Mic A , ,Mic B"),
            vec!["Mic A".to_string(), "Mic B".to_string()]
        );
        assert!(parse_device_list("   ").is_empty());
    }
}
