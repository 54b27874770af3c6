//! Serialization properties that must hold for every `Options` value

use proptest::prelude::*;
use psexec::{CopyMode, Options, Password, Priority};

const PRIORITY_FLAGS: [&str; 6] = [
    "-low",
    "-belownormal",
    "-abovenormal",
    "-high",
    "-realtime",
    "-background",
];

fn copy_strategy() -> impl Strategy<Value = CopyMode> {
    prop_oneof![
        Just(CopyMode::Copy),
        Just(CopyMode::Force),
        Just(CopyMode::IfNewer),
    ]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::BelowNormal),
        Just(Priority::AboveNormal),
        Just(Priority::High),
        Just(Priority::Realtime),
        Just(Priority::Background),
    ]
}

// Credential and directory values never start with '-', so they can't be
// mistaken for flags when counting tokens.
fn options_strategy() -> impl Strategy<Value = Options> {
    (
        proptest::option::of("[a-z][a-z0-9]{0,7}"),
        proptest::option::of("[a-zA-Z0-9]{1,10}"),
        any::<[bool; 7]>(),
        proptest::option::of(0u32..3600),
        proptest::option::of(prop_oneof![Just(String::new()), "[a-z]{1,8}"]),
        proptest::option::of(copy_strategy()),
        proptest::option::of(priority_strategy()),
    )
        .prop_map(
            |(username, password, switches, connect_timeout, working_directory, copy, priority)| {
                Options {
                    username,
                    password: password.map(Password::new),
                    accept_eula: switches[0],
                    no_wait: switches[1],
                    dont_load_profile: switches[2],
                    elevated: switches[3],
                    interactive: switches[4],
                    limited: switches[5],
                    display_on_winlogon: switches[6],
                    connect_timeout,
                    working_directory,
                    copy,
                    priority,
                }
            },
        )
}

fn count(args: &[String], flag: &str) -> usize {
    args.iter().filter(|a| *a == flag).count()
}

/// Position of each flag in the fixed serialization order; values that
/// follow `-u`, `-p`, `-n` and `-w` are skipped
fn flag_ranks(args: &[String]) -> Vec<usize> {
    let mut ranks = Vec::new();
    let mut tokens = args.iter();

    while let Some(token) = tokens.next() {
        let rank = match token.as_str() {
            "-u" => 0,
            "-p" => 1,
            "-h" => 2,
            "-e" => 3,
            "-i" => 4,
            "-l" => 5,
            "-x" => 6,
            "-d" => 7,
            "-accepteula" => 8,
            "-n" => 9,
            "-w" => 10,
            flag if PRIORITY_FLAGS.contains(&flag) => 11,
            "-f" | "-v" => 12,
            "-c" => 13,
            other => panic!("unexpected token {other:?}"),
        };
        if matches!(rank, 0 | 1 | 9 | 10) {
            tokens.next();
        }
        ranks.push(rank);
    }

    ranks
}

proptest! {
    #[test]
    fn test_group_flags_appear_at_most_once(options in options_strategy()) {
        let args = options.to_args();

        let priorities: usize = PRIORITY_FLAGS.iter().map(|f| count(&args, f)).sum();
        prop_assert_eq!(priorities, usize::from(options.priority.is_some()));
        if let Some(priority) = options.priority {
            prop_assert_eq!(count(&args, priority.flag()), 1);
        }

        prop_assert_eq!(count(&args, "-c"), usize::from(options.copy.is_some()));
        prop_assert_eq!(
            count(&args, "-f"),
            usize::from(options.copy == Some(CopyMode::Force))
        );
        prop_assert_eq!(
            count(&args, "-v"),
            usize::from(options.copy == Some(CopyMode::IfNewer))
        );
    }

    #[test]
    fn test_credentials_only_as_a_pair(options in options_strategy()) {
        let args = options.to_args();
        let both = options.username.is_some() && options.password.is_some();

        prop_assert_eq!(count(&args, "-u"), usize::from(both));
        prop_assert_eq!(count(&args, "-p"), usize::from(both));
        if both {
            prop_assert_eq!(&args[1], options.username.as_ref().unwrap());
            prop_assert_eq!(args[3].as_str(), options.password.as_ref().unwrap().expose());
        }
    }

    #[test]
    fn test_unset_fields_emit_nothing(options in options_strategy()) {
        let args = options.to_args();
        let switches = [
            (options.elevated, "-h"),
            (options.dont_load_profile, "-e"),
            (options.interactive, "-i"),
            (options.limited, "-l"),
            (options.display_on_winlogon, "-x"),
            (options.no_wait, "-d"),
            (options.accept_eula, "-accepteula"),
        ];
        for (enabled, flag) in switches {
            prop_assert_eq!(count(&args, flag), usize::from(enabled), "flag {}", flag);
        }

        prop_assert_eq!(count(&args, "-n"), usize::from(options.connect_timeout.is_some()));
        let has_dir = options
            .working_directory
            .as_deref()
            .is_some_and(|d| !d.is_empty());
        prop_assert_eq!(count(&args, "-w"), usize::from(has_dir));
    }

    #[test]
    fn test_flags_follow_fixed_order(options in options_strategy()) {
        let ranks = flag_ranks(&options.to_args());
        prop_assert!(
            ranks.windows(2).all(|pair| pair[0] < pair[1]),
            "out of order: {:?}",
            ranks
        );
    }
}
