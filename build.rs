// build.rs

use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

type BuildResult<T> = Result<T, Box<dyn Error>>;

/// Every catalog is layered over this one, so a key missing elsewhere still resolves.
const FALLBACK_LANG: &str = "en";

fn main() -> BuildResult<()> {
    let lang = effective_language();

    println!("cargo:rustc-env=SHELLWRAP_LANG_EFFECTIVE={}", lang);
    println!("cargo:rerun-if-env-changed=SHELLWRAP_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    let mut catalog = read_catalog(FALLBACK_LANG)?
        .ok_or("the fallback catalog locales/en.toml is missing")?;
    if lang != FALLBACK_LANG {
        match read_catalog(&lang)? {
            Some(overrides) => catalog.extend(overrides),
            None => println!(
                "cargo:warning=No catalog for language '{}'. Messages stay in '{}'.",
                lang, FALLBACK_LANG
            ),
        }
    }

    let out_dir = env::var("OUT_DIR")?;
    fs::write(
        Path::new(&out_dir).join("translations.rs"),
        render_macro(&catalog),
    )?;
    Ok(())
}

/// A `lang_*` feature wins over `SHELLWRAP_LANG`, which wins over the fallback.
/// With several features on, the alphabetically first one is used.
fn effective_language() -> String {
    let mut features: Vec<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(str::to_lowercase)
        })
        .collect();
    features.sort();

    if features.len() > 1 {
        println!(
            "cargo:warning=Several language features are enabled ({:?}). Using '{}'.",
            features,
            features.first().map_or(FALLBACK_LANG, String::as_str)
        );
    }
    features
        .into_iter()
        .next()
        .or_else(|| env::var("SHELLWRAP_LANG").ok())
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

/// Reads `locales/<lang>.toml`. `Ok(None)` when the file does not exist.
fn read_catalog(lang: &str) -> BuildResult<Option<BTreeMap<String, String>>> {
    let path = format!("locales/{}.toml", lang);
    if !Path::new(&path).exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|e| format!("reading {}: {}", path, e))?;
    let catalog = toml::from_str(&content).map_err(|e| format!("parsing {}: {}", path, e))?;
    Ok(Some(catalog))
}

/// One arm per key, plus a catch-all that turns an unknown key into a compile error.
/// `{:?}` renders each key and message as a valid Rust string literal.
fn render_macro(catalog: &BTreeMap<String, String>) -> String {
    let arms: String = catalog
        .iter()
        .map(|(key, message)| format!("    ({:?}) => {{ {:?} }};\n", key, message))
        .collect();
    format!(
        "/// Looks up a user-facing message by key at compile time.\n\
         #[macro_export]\n\
         macro_rules! t {{\n\
         {arms}    \
         ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n\
         }}\n"
    )
}
