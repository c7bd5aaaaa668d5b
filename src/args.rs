//! Command-line argument parsing for the keyboard synthesizer.

use std::env;
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// JSON configuration file
    pub config_path: Option<PathBuf>,
    /// Print the effective configuration and exit
    pub dump_config: bool,
    /// Render a key script to this WAV file instead of playing live
    pub render_path: Option<PathBuf>,
    /// Key script for `--render`
    pub script: Option<String>,
    /// Debug logging
    pub verbose: bool,
    /// Whether help was requested
    pub show_help: bool,
}

impl CliArgs {
    /// Parse arguments from command line.
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse arguments from an iterator (program name excluded).
    pub fn parse_from<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut args = Self::default();
        let mut iter = iter.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => {
                    args.show_help = true;
                }
                "--verbose" | "-v" => {
                    args.verbose = true;
                }
                "--dump-config" => {
                    args.dump_config = true;
                }
                "--config" => match iter.next() {
                    Some(value) => args.config_path = Some(PathBuf::from(value)),
                    None => {
                        eprintln!("--config requires a file argument");
                        args.show_help = true;
                    }
                },
                "--render" => match iter.next() {
                    Some(value) => args.render_path = Some(PathBuf::from(value)),
                    None => {
                        eprintln!("--render requires an output file argument");
                        args.show_help = true;
                    }
                },
                "--script" => match iter.next() {
                    Some(value) => args.script = Some(value),
                    None => {
                        eprintln!("--script requires a key string argument");
                        args.show_help = true;
                    }
                },
                _ if arg.starts_with("--config=") => {
                    args.config_path = Some(PathBuf::from(&arg["--config=".len()..]));
                }
                _ if arg.starts_with("--render=") => {
                    args.render_path = Some(PathBuf::from(&arg["--render=".len()..]));
                }
                _ if arg.starts_with("--script=") => {
                    args.script = Some(arg["--script=".len()..].to_string());
                }
                _ => {
                    eprintln!("Unknown argument: {}", arg);
                    args.show_help = true;
                }
            }
        }

        if args.script.is_some() && args.render_path.is_none() {
            eprintln!("--script is only used together with --render");
        }

        args
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  opl-keys [--config <file.json>] [-v]\n  \
             opl-keys --render <out.wav> [--script <keys>] [--config <file.json>]\n  \
             opl-keys --dump-config [--config <file.json>]\n\n\
             Flags:\n\
             \x20 --config <file>      Load settings and voice patch from JSON\n\
             \x20 --dump-config        Print the effective configuration as JSON\n\
             \x20 --render <file>      Render a key script to a WAV file\n\
             \x20 --script <keys>      Keys to render, '.' is a rest (default: the note row)\n\
             \x20 -v, --verbose        Debug logging (RUST_LOG overrides)\n\
             \x20 -h, --help           Show this help\n\n\
             Keys:\n\
             \x20 a s d f g h j k l ; ' \\   Notes (C to B)\n\
             \x20 0 / 1                     FM / additive algorithm\n\
             \x20 z / x                     Octave down / up\n\
             \x20 Esc, Ctrl-C               Quit\n\n\
             Examples:\n\
             \x20 opl-keys\n\
             \x20 opl-keys --render scale.wav --script \"asdfghjk.1kjhgfdsa\"\n"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(parse(&[]), CliArgs::default());
    }

    #[test]
    fn test_flags() {
        let args = parse(&["-v", "--config", "voice.json", "--dump-config"]);
        assert!(args.verbose);
        assert!(args.dump_config);
        assert_eq!(args.config_path, Some(PathBuf::from("voice.json")));
        assert!(!args.show_help);
    }

    #[test]
    fn test_render_with_script() {
        let args = parse(&["--render=out.wav", "--script", "asd.f"]);
        assert_eq!(args.render_path, Some(PathBuf::from("out.wav")));
        assert_eq!(args.script.as_deref(), Some("asd.f"));
    }

    #[test]
    fn test_missing_values_and_unknown_flags_show_help() {
        assert!(parse(&["--config"]).show_help);
        assert!(parse(&["--render"]).show_help);
        assert!(parse(&["--bogus"]).show_help);
        assert!(parse(&["song.ym"]).show_help);
        assert!(parse(&["-h"]).show_help);
    }
}
