//! Clap derive structures for the `anthem` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only depends on clap so build.rs can render man pages from it.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// anthem -- control Kohler Anthem digital showers from the command line
#[derive(Debug, Parser)]
#[command(
    name = "anthem",
    version,
    about = "Control Kohler Anthem digital showers from the command line",
    long_about = "Talks to the Kohler cloud the way the mobile app does: signs in,\n\
        lists shower controllers, reads their state, starts presets and warmups,\n\
        drives individual valves, and watches realtime notifications.\n\n\
        The `valve` commands work offline on captured command words.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "ANTHEM_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account id (skips reading it from the access token)
    #[arg(long, env = "ANTHEM_CUSTOMER_ID", global = true)]
    pub customer_id: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ANTHEM_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ANTHEM_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Valve vocabulary ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutletArg {
    Showerhead,
    TubFiller,
    Handshower,
    TubHandheld,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Off,
    Shower,
    TubFiller,
    TubHandheld,
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValveArg {
    Primary,
    Secondary1,
    Secondary2,
    Secondary3,
    Secondary4,
    Secondary5,
    Secondary6,
    Secondary7,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncodingArg {
    /// Whole degrees and whole percent
    Legacy,
    /// Tenths of a degree above 25.6 °C, half-percent flow steps
    Scaled,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List shower controllers on the account
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show live state of a controller
    #[command(alias = "st")]
    State(DeviceArg),

    /// List, start, and stop presets and experiences
    Presets(PresetsArgs),

    /// Start or stop warmup
    Warmup(WarmupArgs),

    /// Drive a single outlet
    Outlet(OutletArgs),

    /// Stop water while keeping the shower session
    Pause(PauseArgs),

    /// Turn all valves off
    Off(DeviceArg),

    /// Encode and decode valve command words (offline)
    Valve(ValveArgs),

    /// Stream realtime notifications until interrupted
    Watch(WatchArgs),

    /// Inspect CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct DeviceArg {
    /// Device id
    pub device: String,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices across all locations
    #[command(alias = "ls")]
    List,

    /// Show one device
    Get(DeviceArg),
}

// ── Presets ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PresetsArgs {
    #[command(subcommand)]
    pub command: PresetsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PresetsCommand {
    /// List presets configured on a device
    #[command(alias = "ls")]
    List {
        /// Device id
        device: String,

        /// Only experiences
        #[arg(long, conflicts_with = "presets_only")]
        experiences: bool,

        /// Only plain presets
        #[arg(long)]
        presets_only: bool,
    },

    /// Start a preset or experience
    Start {
        /// Device id
        device: String,
        /// Preset id
        preset: u32,
    },

    /// Stop a running preset or experience
    Stop {
        /// Device id
        device: String,
        /// Preset id
        preset: u32,
    },
}

// ── Warmup ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WarmupArgs {
    #[command(subcommand)]
    pub command: WarmupCommand,
}

#[derive(Debug, Subcommand)]
pub enum WarmupCommand {
    /// Start warming up
    Start {
        /// Device id
        device: String,
        /// Preset to warm up for (default 1)
        #[arg(long)]
        preset: Option<u32>,
    },

    /// Stop warming up
    Stop {
        /// Device id
        device: String,
        /// Preset being warmed up for (default 1)
        #[arg(long)]
        preset: Option<u32>,
    },
}

// ── Outlet ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OutletArgs {
    #[command(subcommand)]
    pub command: OutletCommand,
}

#[derive(Debug, Subcommand)]
pub enum OutletCommand {
    /// Open an outlet at a temperature and flow
    On {
        /// Device id
        device: String,
        /// Outlet to open
        outlet: OutletArg,
        /// Temperature in °C (15-49)
        #[arg(long, short = 't', default_value = "37.7")]
        temperature: f64,
        /// Flow in percent (0-100)
        #[arg(long, short = 'f', default_value = "100")]
        flow: f64,
    },

    /// Change temperature (flow defaults to 100%)
    Temperature {
        /// Device id
        device: String,
        /// Outlet to drive
        outlet: OutletArg,
        /// Temperature in °C (15-49)
        celsius: f64,
        /// Flow in percent to run at
        #[arg(long, short = 'f')]
        flow: Option<f64>,
    },

    /// Change flow (temperature defaults to 37.7 °C)
    Flow {
        /// Device id
        device: String,
        /// Outlet to drive
        outlet: OutletArg,
        /// Flow in percent (0-100)
        percent: f64,
        /// Temperature in °C to run at
        #[arg(long, short = 't')]
        temperature: Option<f64>,
    },
}

// ── Pause ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PauseArgs {
    /// Device id
    pub device: String,

    /// Temperature to hold in °C
    #[arg(long, short = 't', default_value = "38")]
    pub temperature: f64,

    /// Flow to resume at, in percent
    #[arg(long, short = 'f', default_value = "50")]
    pub flow: f64,
}

// ── Valve codec ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValveArgs {
    /// Byte packing generation
    #[arg(long, short = 'e', default_value = "legacy", global = true)]
    pub encoding: EncodingArg,

    #[command(subcommand)]
    pub command: ValveCommand,
}

#[derive(Debug, Subcommand)]
pub enum ValveCommand {
    /// Build a command word
    Encode {
        /// Temperature in °C (15-49)
        #[arg(long, short = 't', default_value = "37.7")]
        temperature: f64,
        /// Flow in percent (0-100)
        #[arg(long, short = 'f', default_value = "100")]
        flow: f64,
        /// Mode byte
        #[arg(long, short = 'm', default_value = "shower")]
        mode: ModeArg,
        /// Addressed valve
        #[arg(long, default_value = "primary")]
        valve: ValveArg,
    },

    /// Explain one or more captured command words
    Decode {
        /// 8-character hex words, e.g. 01266401
        #[arg(required = true)]
        words: Vec<String>,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Re-read and print this device's state on every invalidation
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Exit after this many notifications
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// List profile names
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
