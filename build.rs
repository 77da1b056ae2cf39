// build.rs

//! Bakes the message catalogue from `locales/<lang>.toml` into a `t!` macro.
//!
//! `t!("key")` expands to a string literal, so messages can be used as
//! `format!` templates and a missing key is a compile error.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";
const LANG_FEATURE_PREFIX: &str = "CARGO_FEATURE_LANG_";
const LANG_VAR: &str = "ENVDIR_LANG";

type Catalogue = BTreeMap<String, String>;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");
    println!("cargo:rerun-if-env-changed={}", LANG_VAR);

    let lang = selected_language();
    println!("cargo:rustc-env=ENVDIR_LANG_EFFECTIVE={}", lang);

    let mut catalogue = load_catalogue(FALLBACK_LANG)
        .unwrap_or_else(|| panic!("locales/{}.toml is required", FALLBACK_LANG));
    if lang != FALLBACK_LANG {
        match load_catalogue(&lang) {
            Some(overrides) => catalogue.extend(overrides),
            None => println!(
                "cargo:warning=No locales/{}.toml, messages stay in '{}'.",
                lang, FALLBACK_LANG
            ),
        }
    }

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let dest = Path::new(&out_dir).join("translations.rs");
    fs::write(&dest, render_macro(&catalogue)).expect("could not write translations.rs");
}

/// A `lang_*` feature wins over `ENVDIR_LANG`; English is the default.
fn selected_language() -> String {
    let mut from_features: Vec<String> = env::vars()
        .filter_map(|(key, _)| key.strip_prefix(LANG_FEATURE_PREFIX).map(str::to_lowercase))
        .collect();
    from_features.sort();

    if from_features.len() > 1 {
        println!(
            "cargo:warning=Several language features are enabled ({:?}); using '{}'.",
            from_features, from_features[0]
        );
    }
    from_features
        .into_iter()
        .next()
        .or_else(|| env::var(LANG_VAR).ok())
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

fn load_catalogue(lang: &str) -> Option<Catalogue> {
    let path = format!("locales/{}.toml", lang);
    let content = fs::read_to_string(&path).ok()?;
    let catalogue = toml::from_str(&content).unwrap_or_else(|e| panic!("{} is malformed: {}", path, e));
    Some(catalogue)
}

fn render_macro(catalogue: &Catalogue) -> String {
    let mut code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, message) in catalogue {
        code.push_str(&format!("    ({:?}) => {{ {:?} }};\n", key, message));
    }
    code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    code.push_str("}\n");
    code
}
