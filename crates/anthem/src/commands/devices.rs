//! Device command handlers.

use tabled::Tabled;

use anthem_core::{Account, Controller, Device};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "SKU")]
    sku: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Provisioned")]
    provisioned: String,
}

impl DeviceRow {
    fn new(d: &Device, color: bool) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.logical_name.clone(),
            sku: d.sku.clone(),
            serial: d.serial_number.clone().unwrap_or_default(),
            active: output::on_off(d.is_active, color),
            provisioned: output::on_off(d.is_provisioned, color),
        }
    }
}

fn location_of<'a>(account: Option<&'a Account>, device_id: &str) -> Option<&'a str> {
    account?
        .locations
        .iter()
        .find(|loc| loc.devices.iter().any(|d| d.device_id == device_id))
        .map(|loc| loc.name.as_str())
}

fn detail(d: &Device, location: Option<&str>) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut lines = vec![
        format!("ID:          {}", d.device_id),
        format!("Name:        {}", d.logical_name),
        format!("SKU:         {}", d.sku),
        format!("Serial:      {}", d.serial_number.as_deref().unwrap_or("-")),
        format!("Location:    {}", location.filter(|l| !l.is_empty()).unwrap_or("-")),
        format!("Active:      {}", yes_no(d.is_active)),
        format!("Provisioned: {}", yes_no(d.is_provisioned)),
    ];
    if let Some(ref ssid) = d.ssid {
        lines.push(format!("WiFi:        {ssid}"));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        DevicesCommand::List => {
            let devices = controller.devices().await;
            let out = output::render_list(
                &global.output,
                &devices,
                |d| DeviceRow::new(d, color),
                |d| d.device_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get(arg) => {
            let device = controller.device(&arg.device).await?;
            let account = controller.account().await;
            let location = location_of(account.as_ref(), &device.device_id);
            let out = output::render_single(
                &global.output,
                &device,
                |d| detail(d, location),
                |d| d.device_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
