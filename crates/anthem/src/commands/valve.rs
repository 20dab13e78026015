//! Offline valve codec handlers.
//!
//! Build and explain command words without an account session, e.g. to
//! make sense of words captured from the mobile app's traffic.

use serde::Serialize;
use tabled::Tabled;

use anthem_core::{CommandEncoding, CoreError, DecodedCommand};

use crate::cli::{GlobalOpts, ValveArgs, ValveCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct WordView {
    word: String,
    encoding: CommandEncoding,
    #[serde(flatten)]
    decoded: DecodedCommand,
}

#[derive(Tabled)]
struct WordRow {
    #[tabled(rename = "Word")]
    word: String,
    #[tabled(rename = "Valve")]
    valve: String,
    #[tabled(rename = "Temp °C")]
    temperature: String,
    #[tabled(rename = "Flow %")]
    flow: String,
    #[tabled(rename = "Mode")]
    mode: String,
}

impl From<&WordView> for WordRow {
    fn from(v: &WordView) -> Self {
        Self {
            word: v.word.clone(),
            valve: v.decoded.valve.to_string(),
            temperature: format!("{:.1}", v.decoded.temperature_celsius),
            flow: format!("{:.1}", v.decoded.flow_percent),
            mode: v.decoded.mode.to_string(),
        }
    }
}

fn detail(v: &WordView) -> String {
    [
        format!("Word:        {}", v.word),
        format!("Encoding:    {}", v.encoding),
        format!("Valve:       {}", v.decoded.valve),
        format!("Temperature: {:.1}°C", v.decoded.temperature_celsius),
        format!("Flow:        {:.1}%", v.decoded.flow_percent),
        format!("Mode:        {}", v.decoded.mode),
    ]
    .join("\n")
}

pub fn handle(args: &ValveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let encoding = CommandEncoding::from(args.encoding);

    match args.command {
        ValveCommand::Encode {
            temperature,
            flow,
            mode,
            valve,
        } => {
            let word = encoding
                .encode(temperature, flow, mode.into(), valve.into())
                .map_err(CoreError::from)?;
            let view = WordView {
                word: word.to_string(),
                encoding,
                decoded: encoding.decode(word),
            };
            let out = output::render_single(&global.output, &view, detail, |v| v.word.clone())?;
            output::print_output(&out, global.quiet);
        }

        ValveCommand::Decode { ref words } => {
            let views = words
                .iter()
                .map(|w| {
                    let word = w.trim().to_ascii_uppercase();
                    let decoded = encoding.decode_hex(&word).map_err(CoreError::from)?;
                    Ok(WordView {
                        word,
                        encoding,
                        decoded,
                    })
                })
                .collect::<Result<Vec<_>, CliError>>()?;
            let out = output::render_list(
                &global.output,
                &views,
                |v| WordRow::from(v),
                |v| v.word.clone(),
            )?;
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}
