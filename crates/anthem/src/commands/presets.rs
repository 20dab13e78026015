//! Preset command handlers.

use tabled::Tabled;

use anthem_core::{Command as CoreCommand, Controller, Preset};

use crate::cli::{GlobalOpts, PresetsArgs, PresetsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Minutes")]
    minutes: i64,
    #[tabled(rename = "Valves")]
    valves: usize,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&Preset> for PresetRow {
    fn from(p: &Preset) -> Self {
        Self {
            id: p.preset_id.clone(),
            title: p.title.clone(),
            kind: if p.is_experience {
                "experience"
            } else {
                "preset"
            },
            minutes: p.duration_minutes(),
            valves: p.valves.len(),
            state: p.state.clone(),
        }
    }
}

pub async fn handle(
    controller: &Controller,
    args: PresetsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PresetsCommand::List {
            device,
            experiences,
            presets_only,
        } => {
            let list = controller.presets(&device).await?;
            let shown: Vec<Preset> = if experiences {
                list.experiences().cloned().collect()
            } else if presets_only {
                list.presets_only().cloned().collect()
            } else {
                list.presets
            };
            let out = output::render_list(
                &global.output,
                &shown,
                |p| PresetRow::from(p),
                |p| p.preset_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PresetsCommand::Start { device, preset } => {
            let title = controller
                .preset(&device, preset)
                .await
                .map(|p| p.title)
                .unwrap_or_default();
            let result = controller
                .execute(CoreCommand::StartPreset {
                    device_id: device,
                    preset_id: preset,
                })
                .await?;
            let label = if title.is_empty() {
                format!("Preset {preset}")
            } else {
                format!("Preset {preset} ({title})")
            };
            util::report_ack(&result, &format!("{label} started"), global)
        }

        PresetsCommand::Stop { device, preset } => {
            let result = controller
                .execute(CoreCommand::StopPreset {
                    device_id: device,
                    preset_id: preset,
                })
                .await?;
            util::report_ack(&result, &format!("Preset {preset} stopped"), global)
        }
    }
}
