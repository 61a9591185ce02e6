// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line entry point for the MicroPython flashing tool.

mod cli_commands;

use std::io::stdout;
use std::path::PathBuf;

use clap::builder::styling::Styles;
use clap::{crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use color_eyre::config::HookBuilder;
use color_eyre::eyre::{EyreHandler, InstallError, Result};
use color_eyre::owo_colors::OwoColorize;
use log::error;
use mpflash::config::Config;

use crate::cli_commands::Commands;

#[derive(Parser)]
#[command(
    version,
    about = format!("{} v{}", crate_description!(), crate_version!()),
    styles(style()),
    disable_colored_help(false),
    arg_required_else_help(true)
)]
struct CliArguments
{
    /// Override the per-user configuration directory
    #[arg(global = true, long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn style() -> Styles
{
    Styles::styled()
        .usage(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))).bold())
        .header(anstyle::Style::new().bold().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))))
        .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

type EyreHookFunc = Box<dyn Fn(&(dyn std::error::Error + 'static)) -> Box<dyn EyreHandler> + Send + Sync + 'static>;
type PanicHookFunc = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync + 'static>;

struct MpflashHook
{
    inner_hook: EyreHookFunc,
}

struct MpflashPanic
{
    inner_hook: PanicHookFunc,
}

struct MpflashHandler
{
    inner_handler: Box<dyn EyreHandler>,
}

impl MpflashHook
{
    fn build_handler(&self, error: &(dyn std::error::Error + 'static)) -> MpflashHandler
    {
        MpflashHandler { inner_handler: (*self.inner_hook)(error) }
    }

    fn install(self) -> std::result::Result<(), InstallError>
    {
        color_eyre::eyre::set_hook(self.into_eyre_hook())
    }

    fn into_eyre_hook(self) -> EyreHookFunc
    {
        Box::new(move |err| Box::new(self.build_handler(err)))
    }
}

impl MpflashPanic
{
    fn install(self)
    {
        std::panic::set_hook(self.into_panic_hook());
    }

    fn into_panic_hook(self) -> PanicHookFunc
    {
        Box::new(move |panic_info| {
            self.print_header();
            (*self.inner_hook)(panic_info);
            self.print_footer();
        })
    }

    fn print_header(&self)
    {
        eprintln!("------------[ cut here ]------------");
        eprintln!("Unhandled crash in mpflash-cli v{}", crate_version!());
        eprintln!();
    }

    fn print_footer(&self)
    {
        eprintln!();
        eprintln!("{}", "Please include all lines down to this one from the cut here".yellow());
        eprintln!("{}", "marker when reporting this issue.".yellow());
    }
}

impl EyreHandler for MpflashHandler
{
    fn debug(&self, error: &(dyn std::error::Error + 'static), fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result
    {
        writeln!(fmt, "------------[ cut here ]------------")?;
        write!(fmt, "Unhandled crash in mpflash-cli v{}", crate_version!())?;
        self.inner_handler.debug(error, fmt)?;
        writeln!(fmt)?;
        writeln!(fmt)?;
        writeln!(fmt, "{}", "Please include all lines down to this one from the cut here".yellow())?;
        write!(fmt, "{}", "marker when reporting this issue.".yellow())
    }

    fn track_caller(&mut self, location: &'static std::panic::Location<'static>)
    {
        self.inner_handler.track_caller(location);
    }
}

fn install_error_handler() -> Result<()>
{
    let default_handler = HookBuilder::default();
    let (panic_hook, eyre_hook) = default_handler.try_into_hooks()?;

    MpflashPanic { inner_hook: panic_hook.into_panic_hook() }.install();
    MpflashHook { inner_hook: eyre_hook.into_eyre_hook() }.install()?;
    Ok(())
}

fn main() -> Result<()>
{
    install_error_handler()?;
    env_logger::Builder::new().filter_level(log::LevelFilter::Info).parse_default_env().init();

    let cli_args = CliArguments::parse();
    let config = Config::resolve(cli_args.config.clone());

    let exit_code = match &cli_args.command {
        Commands::List(args) => {
            cli_commands::list::run(&config, args)?;
            0
        },
        Commands::Download(args) => {
            cli_commands::download::run(&config, args)?;
            0
        },
        Commands::Flash(args) => cli_commands::flash::run(&config, args)?,
        Commands::ListProbes => {
            cli_commands::probes::list_probes()?;
            0
        },
        Commands::PyocdInfo => {
            cli_commands::probes::pyocd_info()?;
            0
        },
        Commands::PyocdTargets => {
            cli_commands::probes::pyocd_targets()?;
            0
        },
        Commands::Completions(args) => {
            generate(args.shell, &mut CliArguments::command(), "mpflash-cli", &mut stdout());
            0
        },
    };

    if exit_code != 0 {
        error!("mpflash exiting with status {exit_code}");
    }
    std::process::exit(exit_code);
}
