use pretty_assertions::assert_eq;
use proptest::prelude::*;
use seedbatch::control_file::{apply, rewrite, ControlKey};
use seedbatch::types::RunParameters;
use seedbatch_test_utils::{TestWorkspace, CONTROL_TEMPLATE, CONTROL_TEMPLATE_RECOGNISED};

fn params(seed: u64, energy: &str, particle: &str, histories: u64) -> RunParameters {
    RunParameters {
        seed,
        energy: energy.into(),
        particle: particle.into(),
        histories,
    }
}

#[test]
fn test_apply_rewrites_in_place() {
    let ws = TestWorkspace::new();
    let path = ws.write_control_file(CONTROL_TEMPLATE);

    let result = apply(&path, &params(4, "10", "alpha", 500)).unwrap();
    assert_eq!(result.substituted, CONTROL_TEMPLATE_RECOGNISED);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, result.contents);
    assert!(text.contains("i:Ts/Seed = 4\n"));
    assert!(text.contains("s:So/Demo/BeamParticle = \"alpha\"\n"));
    assert!(text.contains("d:So/Demo/BeamEnergy = 10 MeV\n"));
    assert!(text.contains("i:So/Demo/NumberOfHistoriesInRun = 500\n"));
    // Commented and unrelated lines untouched
    assert!(text.contains("# i:Ts/Seed = 99\n"));
    assert!(text.contains("includeFile = supportFiles/geometry.txt\n"));
}

#[test]
fn test_apply_missing_file_fails_without_creating_it() {
    let ws = TestWorkspace::new();
    let path = ws.control_file();
    assert!(apply(&path, &params(0, "6", "proton", 1)).is_err());
    assert!(!path.exists());
}

fn particle() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9+-]{0,7}"
}

fn energy() -> impl Strategy<Value = String> {
    prop_oneof!["[1-9][0-9]{0,3}", "[0-9]{1,2}\\.[0-9]{1,3}"]
}

/// Template lines mixed with arbitrary printable lines, some of them
/// assignments to recognised keys
fn control_lines() -> impl Strategy<Value = Vec<String>> {
    let line = prop_oneof![
        prop::sample::select(CONTROL_TEMPLATE.lines().map(String::from).collect::<Vec<_>>()),
        "[ -~]{0,40}",
        "[a-z]:[A-Za-z/]{1,12}(Seed|BeamEnergy|Other) *= *[ -~]{0,10}",
    ];
    prop::collection::vec(line, 0..30)
}

fn is_recognised(line: &str) -> bool {
    !line.trim_start().starts_with('#')
        && line
            .split_once('=')
            .is_some_and(|(key, _)| ControlKey::recognize(key).is_some())
}

proptest! {
    #[test]
    fn prop_rewrite_is_idempotent(
        seed in any::<u64>(),
        energy in energy(),
        particle in particle(),
        histories in 1u64..10_000_000,
    ) {
        let p = params(seed, &energy, &particle, histories);
        let once = rewrite(CONTROL_TEMPLATE, &p);
        let twice = rewrite(&once.contents, &p);
        prop_assert_eq!(&once.contents, &twice.contents);
        prop_assert_eq!(once.substituted, CONTROL_TEMPLATE_RECOGNISED);
    }

    #[test]
    fn prop_unrecognised_lines_are_byte_identical(lines in control_lines(), seed in any::<u64>()) {
        let source: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let out = rewrite(&source, &params(seed, "6", "proton", 1000));

        let before: Vec<&str> = source.split_inclusive('\n').collect();
        let after: Vec<&str> = out.contents.split_inclusive('\n').collect();
        prop_assert_eq!(before.len(), after.len());

        let mut matched = 0;
        for (input, output) in before.iter().zip(&after) {
            if is_recognised(input) {
                matched += 1;
                let key = input.split_once('=').map(|(k, _)| k.trim_end()).unwrap_or_default();
                let prefix = format!("{key} = ");
                prop_assert!(output.starts_with(&prefix));
            } else {
                prop_assert_eq!(input, output);
            }
        }
        prop_assert_eq!(out.substituted, matched);
    }

    #[test]
    fn prop_rewrite_preserves_line_count(
        seed in any::<u64>(),
        crlf in any::<bool>(),
        trailing_newline in any::<bool>(),
    ) {
        let mut source = if crlf {
            CONTROL_TEMPLATE.replace('\n', "\r\n")
        } else {
            CONTROL_TEMPLATE.to_string()
        };
        if !trailing_newline {
            source.truncate(source.trim_end().len());
        }

        let out = rewrite(&source, &params(seed, "6", "proton", 1000));
        prop_assert_eq!(out.lines, source.split_inclusive('\n').count());
        prop_assert_eq!(out.contents.lines().count(), source.lines().count());
        prop_assert_eq!(out.contents.ends_with('\n'), source.ends_with('\n'));
        prop_assert_eq!(out.contents.matches("\r\n").count(), source.matches("\r\n").count());
    }
}
