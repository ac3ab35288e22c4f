mod session;

use std::env;
use std::io;
use std::process;

use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: access-node-emulator [single|double|fault] | --profile <single|double|fault>";

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let profile = select_profile(&args).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(profile)?;
    session.run(io::stdin().lock(), io::stdout().lock())
}

/// Picks the boot profile from the command line, single activation by default.
fn select_profile(args: &[String]) -> Result<TranscriptProfile, String> {
    match args {
        [] => Ok(TranscriptProfile::Single),
        [flag, tag] if flag == "--profile" => TranscriptProfile::from_tag(tag),
        [arg] => match arg.strip_prefix("--profile=") {
            Some(tag) => TranscriptProfile::from_tag(tag),
            None if arg == "--profile" => Err("Expected value after --profile".to_string()),
            None => TranscriptProfile::from_tag(arg),
        },
        _ => Err(format!("Unexpected arguments: {}", args.join(" "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn profile_comes_from_a_tag_or_the_flag() {
        assert_eq!(select_profile(&[]), Ok(TranscriptProfile::Single));
        assert_eq!(select_profile(&args(&["fault"])), Ok(TranscriptProfile::Fault));
        assert_eq!(
            select_profile(&args(&["--profile", "double"])),
            Ok(TranscriptProfile::Double)
        );
        assert_eq!(
            select_profile(&args(&["--profile=DOUBLE"])),
            Ok(TranscriptProfile::Double)
        );
        assert!(select_profile(&args(&["--profile"])).is_err());
        assert!(select_profile(&args(&["single", "extra"])).is_err());
    }
}
