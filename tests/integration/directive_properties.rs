//! Property tests for require/replace directives and edit compilation.

use gomod_patcher::gomod::{gomod_edit_command, GomodEdits, GomodReplace, GomodRequire};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_module() -> impl Strategy<Value = String> {
    "[a-z]{2,8}\\.(io|com|org)/[a-z]{1,8}(/[a-z0-9]{1,6})?"
}

fn arb_tag() -> impl Strategy<Value = String> {
    (0u32..5, 0u32..30, 0u32..30).prop_map(|(major, minor, patch)| format!("v{major}.{minor}.{patch}"))
}

fn arb_require() -> impl Strategy<Value = GomodRequire> {
    (arb_module(), arb_tag()).prop_map(|(module, tag)| {
        let version = format!("{module}@{tag}");
        GomodRequire::new(module, version)
    })
}

fn arb_replace() -> impl Strategy<Value = GomodReplace> {
    (arb_module(), arb_module(), arb_tag())
        .prop_map(|(old, new, tag)| GomodReplace::new(old, format!("{new}@{tag}")))
}

proptest! {
    #[test]
    fn prop_pinned_require_renders_its_version(require in arb_require()) {
        prop_assert!(require.validate().is_ok());
        prop_assert_eq!(require.edit_arg().unwrap(), require.version.clone());
    }

    #[test]
    fn prop_unpinned_require_is_rejected(module in arb_module(), tag in arb_tag()) {
        let require = GomodRequire::new(module, tag);
        let err = require.validate().unwrap_err();
        prop_assert!(err.to_string().contains("version must include @version"));
        prop_assert!(require.edit_arg().is_err());
    }

    #[test]
    fn prop_replace_with_empty_side_is_rejected(value in arb_module(), empty_old in any::<bool>()) {
        let replace = if empty_old {
            GomodReplace::new("", value)
        } else {
            GomodReplace::new(value, "")
        };
        let err = replace.validate().unwrap_err();
        prop_assert!(err.to_string().contains("must be non-empty"));
    }

    #[test]
    fn prop_compact_form_splits_on_first_colon(left in arb_module(), right in "[a-z0-9./@:]{1,20}") {
        let compact = format!("{left}:{right}");
        let decoded: Result<GomodReplace, _> = serde_json::from_value(serde_json::json!(compact));
        let decoded = decoded.unwrap();
        prop_assert_eq!(decoded.original, left);
        prop_assert_eq!(decoded.update, right);
    }

    #[test]
    fn prop_string_without_colon_fails(value in "[a-z0-9./@]{1,20}") {
        prop_assert!(serde_json::from_value::<GomodReplace>(serde_json::json!(value.clone())).is_err());
        prop_assert!(serde_json::from_value::<GomodRequire>(serde_json::json!(value)).is_err());
    }

    #[test]
    fn prop_replace_flags_precede_require_flags(
        replace in prop::collection::vec(arb_replace(), 0..4),
        require in prop::collection::vec(arb_require(), 0..4),
    ) {
        let edits = GomodEdits { replace: replace.clone(), require: require.clone() };
        let cmd = gomod_edit_command(&edits).unwrap();

        if replace.is_empty() && require.is_empty() {
            prop_assert_eq!(cmd, "");
        } else {
            let flags: Vec<&str> = cmd
                .strip_prefix("go mod edit ")
                .expect("command prefix")
                .split(' ')
                .collect();
            prop_assert_eq!(flags.len(), replace.len() + require.len());

            let (replace_flags, require_flags) = flags.split_at(replace.len());
            for (flag, directive) in replace_flags.iter().zip(&replace) {
                prop_assert_eq!(*flag, format!("-replace={}={}", directive.original, directive.update));
            }
            for (flag, directive) in require_flags.iter().zip(&require) {
                prop_assert_eq!(*flag, format!("-require={}", directive.version));
            }
        }
    }
}
