//! Device state handler.

use chrono::DateTime;

use anthem_core::units::celsius_to_fahrenheit;
use anthem_core::{Controller, DeviceState, TemperatureUnit};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Timestamps above this are milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn format_epoch(raw: i64) -> String {
    let parsed = if raw > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    };
    parsed.map_or_else(|| raw.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{celsius:.1}°C"),
        TemperatureUnit::Fahrenheit => format!("{:.1}°F", celsius_to_fahrenheit(celsius)),
    }
}

fn detail(s: &DeviceState, unit: TemperatureUnit, color: bool) -> String {
    let sys = &s.system;
    let mut lines = vec![
        format!("Device:      {} ({})", s.device_id, s.sku),
        format!(
            "Connection:  {}",
            output::status(&s.connection.to_string(), s.is_connected(), color)
        ),
        format!(
            "Last seen:   {}",
            s.last_connected.map_or_else(|| "-".into(), format_epoch)
        ),
        format!("Shower:      {}", output::on_off(s.is_running(), color)),
        format!("Warmup:      {}", output::on_off(s.is_warming_up(), color)),
        format!(
            "Preset:      {}",
            s.active_preset_id()
                .map_or_else(|| "-".into(), |id| id.to_string())
        ),
        format!("Ready:       {}", if sys.ready { "yes" } else { "no" }),
        format!("Total flow:  {:.1}", sys.total_flow),
        format!("Flow control: {}", s.settings.flow_control),
    ];

    for valve in &sys.valves {
        let mut line = format!(
            "{:<12} {:<4} {:>8}  {:>3}%",
            format!("{}:", valve.valve_index),
            output::on_off(valve.is_active(), color),
            format_temperature(valve.temperature_setpoint, unit),
            valve.flow_setpoint,
        );
        if valve.pause_flag {
            line.push_str("  paused");
        }
        if valve.error_flag {
            line.push_str(&format!("  error {}", valve.error_code));
        }
        lines.push(line);
    }

    lines.join("\n")
}

pub async fn handle(
    controller: &Controller,
    device: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let state = controller.device_state(device).await?;
    let unit = controller
        .account()
        .await
        .map_or(TemperatureUnit::Celsius, |a| a.temperature_unit);
    let color = output::should_color(&global.color);

    let out = output::render_single(
        &global.output,
        &state,
        |s| detail(s, unit, color),
        |s| s.connection.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
