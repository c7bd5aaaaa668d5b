use std::io::Write;
use std::process::ExitCode;

use log::LevelFilter;
use opl_keys::SynthConfig;

mod args;

use args::CliArgs;

/// Keys played by `--render` when no script is given
const DEFAULT_SCRIPT: &str = "asdfghjkl;'\\";

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Raw mode disables the terminal's newline translation
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| write_line(buf, record.level(), record.args()))
        .init();
}

/// One log line; note events (info) print bare like the key handler's output
fn write_line<W: Write>(
    out: &mut W,
    level: log::Level,
    args: &std::fmt::Arguments,
) -> std::io::Result<()> {
    if level == log::Level::Info {
        write!(out, "{}\r\n", args)
    } else {
        write!(out, "[{}] {}\r\n", level, args)
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = match &args.config_path {
        Some(path) => SynthConfig::load_or_default(path),
        None => SynthConfig::default(),
    };

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    if let Some(path) = &args.render_path {
        let script = args.script.as_deref().unwrap_or(DEFAULT_SCRIPT);
        return render(&config, script, path);
    }

    interactive::play(&config)
}

#[cfg(feature = "export-wav")]
fn render(config: &SynthConfig, script: &str, path: &std::path::Path) -> anyhow::Result<()> {
    use anyhow::Context;
    use opl_keys::export::{render_script, write_wav, ScriptTiming};
    use opl_keys::{shared_chip, Opl3, Session};

    let chip = shared_chip(Opl3::with_sample_rate(config.sample_rate));
    let mut session = Session::new(chip, config)?;
    session.configure();

    log::info!("rendering {:?}", script);
    let samples = render_script(&mut session, script, ScriptTiming::default());
    write_wav(path, &samples, config.sample_rate)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(not(feature = "export-wav"))]
fn render(_config: &SynthConfig, _script: &str, _path: &std::path::Path) -> anyhow::Result<()> {
    anyhow::bail!(
        "WAV rendering requires the \"export-wav\" feature. Rebuild with `--features export-wav`."
    )
}

#[cfg(feature = "streaming")]
mod interactive {
    use std::io;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::Context;
    use crossterm::event::{
        self, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    };
    use crossterm::{execute, terminal};
    use opl_keys::input::{self, InputEvent, ReleaseGate};
    use opl_keys::{shared_chip, AudioDevice, Opl3, Session, StreamConfig, SynthConfig};

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Raw terminal mode, restored on drop
    struct RawTerminal {
        reports_releases: bool,
    }

    impl RawTerminal {
        fn enter() -> io::Result<Self> {
            terminal::enable_raw_mode()?;
            let reports_releases = matches!(terminal::supports_keyboard_enhancement(), Ok(true))
                && execute!(
                    io::stdout(),
                    PushKeyboardEnhancementFlags(
                        KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                            | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    )
                )
                .is_ok();
            Ok(RawTerminal { reports_releases })
        }
    }

    impl Drop for RawTerminal {
        fn drop(&mut self) {
            if self.reports_releases {
                let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
            }
            let _ = terminal::disable_raw_mode();
        }
    }

    fn print_banner(config: &SynthConfig) {
        println!("OPL3 FM Keyboard");
        println!("================\n");
        println!("Notes:      {}", config.layout);
        println!("Algorithm:  0 = FM, 1 = additive");
        println!("Octave:     z = down, x = up");
        println!("Quit:       Esc or Ctrl-C\n");
    }

    pub fn play(config: &SynthConfig) -> anyhow::Result<()> {
        print_banner(config);

        let chip = shared_chip(Opl3::with_sample_rate(config.sample_rate));
        let mut session = Session::new(Arc::clone(&chip), config)?;
        session.configure();

        let device = AudioDevice::new(StreamConfig::from_config(config), chip)
            .context("failed to open audio device")?;
        let terminal = RawTerminal::enter().context("failed to initialise keyboard input")?;

        let mut gate = if terminal.reports_releases {
            None
        } else {
            log::warn!(
                "terminal does not report key releases; notes stop after {} ms",
                config.gate_ms
            );
            Some(ReleaseGate::new(Duration::from_millis(config.gate_ms)))
        };

        loop {
            let timeout = gate
                .as_ref()
                .and_then(|g| g.time_left(Instant::now()))
                .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));

            if event::poll(timeout)? {
                match input::translate(&event::read()?) {
                    Some(InputEvent::Quit) => break,
                    Some(InputEvent::KeyDown(key)) => {
                        let is_note = session.layout().semitone(key).is_some();
                        let fresh = match gate.as_mut() {
                            Some(gate) if is_note => gate.press(key, Instant::now()),
                            _ => true,
                        };
                        if fresh {
                            session.key_down(key);
                        }
                    }
                    Some(InputEvent::KeyUp(key)) => session.key_up(key),
                    None => {}
                }
            }

            if let Some(key) = gate.as_mut().and_then(|g| g.poll(Instant::now())) {
                session.key_up(key);
            }
        }

        session.all_notes_off();
        device.finish();
        drop(terminal);
        Ok(())
    }
}

#[cfg(not(feature = "streaming"))]
mod interactive {
    use opl_keys::SynthConfig;

    pub fn play(_config: &SynthConfig) -> anyhow::Result<()> {
        anyhow::bail!(
            "Live playback requires the \"streaming\" feature. Rebuild with `--features streaming`, or use --render."
        )
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    if args.show_help {
        CliArgs::print_help();
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(level: log::Level, args: std::fmt::Arguments) -> String {
        let mut out = Vec::new();
        write_line(&mut out, level, &args).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_log_lines_end_with_crlf() {
        assert_eq!(
            line(log::Level::Info, format_args!("PLAY {} block[{}]", 60, 5)),
            "PLAY 60 block[5]\r\n"
        );
        assert_eq!(
            line(log::Level::Error, format_args!("failed to open audio device")),
            "[ERROR] failed to open audio device\r\n"
        );
    }
}
