//! Integration tests for extension bundles loaded as dynamic libraries

use mpt_extensions::loader::{BundleOpener, NativeBundleOpener};
use mpt_extensions::{
    DirectoryPackageManager, ExtensionManager, LoadedView, Screen, EXTENSION_PERMISSION,
};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

const PACKAGE: &str = "com.example.native";
const COMPASS: &str = "com.example.native.CompassView";

/// Build the fixture bundle once per test run and return the library path
fn native_bundle() -> &'static Path {
    static BUNDLE: OnceLock<PathBuf> = OnceLock::new();
    BUNDLE.get_or_init(build_native_bundle)
}

fn build_native_bundle() -> PathBuf {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let fixture = root.join("tests/fixtures/native-bundle");
    let build_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("native-bundle");
    fs::create_dir_all(build_dir.join("src")).unwrap();

    // Build a copy that points at this crate by absolute path
    let manifest = fs::read_to_string(fixture.join("Cargo.toml"))
        .unwrap()
        .replace(
            r#"path = "../../..""#,
            &format!("path = {:?}", root.display().to_string()),
        );
    fs::write(build_dir.join("Cargo.toml"), manifest).unwrap();
    fs::copy(fixture.join("src/lib.rs"), build_dir.join("src/lib.rs")).unwrap();

    // Share the host's dependency versions
    let lockfile = root.join("Cargo.lock");
    if lockfile.exists() {
        fs::copy(&lockfile, build_dir.join("Cargo.lock")).unwrap();
    }

    let output = Command::new(env!("CARGO"))
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(build_dir.join("Cargo.toml"))
        .arg("--target-dir")
        .arg(build_dir.join("target"))
        .output()
        .expect("failed to run cargo");
    assert!(
        output.status.success(),
        "building the native bundle failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    build_dir
        .join("target/debug")
        .join(format!("{DLL_PREFIX}mpt_test_bundle{DLL_SUFFIX}"))
}

/// Install root holding one package whose code is a copy of the fixture bundle
fn install_native_package() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let package_dir = tmp.path().join("native");
    fs::create_dir_all(package_dir.join("res/xml")).unwrap();

    let code = format!("libnative{DLL_SUFFIX}");
    fs::copy(native_bundle(), package_dir.join(&code)).unwrap();

    fs::write(
        package_dir.join("package.toml"),
        format!(
            r#"
                package = "{PACKAGE}"
                code = "{code}"
                uses-permissions = ["{EXTENSION_PERMISSION}"]

                [meta-data]
                "com.i906.mpt.extension.ExtensionInfo" = "res/xml/extension.xml"
            "#
        ),
    )
    .unwrap();
    fs::write(
        package_dir.join("res/xml/extension.xml"),
        r#"<mpt-extension name="Native" author="Example Labs">
            <screen name="Compass" view="com.example.native.CompassView"/>
            <screen name="Refusing" view="com.example.native.RefusingView"/>
            <screen name="Exploding" view="com.example.native.ExplodingView"/>
        </mpt-extension>"#,
    )
    .unwrap();

    (tmp, package_dir)
}

fn manager(root: &Path) -> ExtensionManager {
    ExtensionManager::new(Arc::new(DirectoryPackageManager::new(vec![
        root.to_path_buf()
    ])))
}

fn screen(view: &str) -> Screen {
    Screen::new(PACKAGE, None, Some(view.to_string()))
}

#[test]
fn test_native_bundle_registers_views() {
    let bundle = NativeBundleOpener::new().open(native_bundle()).unwrap();

    assert_eq!(
        bundle.classes().names().collect::<Vec<_>>(),
        vec![
            "com.example.native.CompassView",
            "com.example.native.ExplodingView",
            "com.example.native.RefusingView",
        ]
    );
}

#[test]
fn test_load_native_view() {
    let (tmp, package_dir) = install_native_package();
    let manager = manager(tmp.path());

    let extensions = manager.scan();
    assert_eq!(extensions.len(), 1);
    assert_eq!(extensions[0].screens.len(), 3);

    let view = manager.load_view(&extensions[0].screens[0]).unwrap();
    assert_eq!(view.class_name(), COMPASS);
    assert_eq!(view.bundle(), package_dir.join(format!("libnative{DLL_SUFFIX}")));
    assert_eq!(view.context().package_name(), PACKAGE);
    assert!(view.context().is_restricted());
}

#[test]
fn test_native_constructor_error_is_unavailable() {
    let (tmp, _) = install_native_package();
    let manager = manager(tmp.path());

    assert!(manager
        .load_view(&screen("com.example.native.RefusingView"))
        .is_none());
    // The host keeps running and the bundle still loads
    assert!(manager.load_view(&screen(COMPASS)).is_some());
}

#[test]
fn test_native_constructor_panic_is_contained() {
    let (tmp, _) = install_native_package();
    let manager = manager(tmp.path());

    assert!(manager
        .load_view(&screen("com.example.native.ExplodingView"))
        .is_none());
    assert!(manager.load_view(&screen(COMPASS)).is_some());
}

#[test]
fn test_native_view_outlives_manager_and_install() {
    let (tmp, _) = install_native_package();

    let view: LoadedView = {
        let manager = manager(tmp.path());
        manager.load_view(&screen(COMPASS)).unwrap()
    };
    drop(tmp);

    // The view keeps its bundle mapped until it is dropped
    assert_eq!(view.class_name(), COMPASS);
    assert_eq!(view.context().package_name(), PACKAGE);
    drop(view);
}

#[test]
fn test_native_views_load_independently() {
    let (tmp, _) = install_native_package();
    let manager = manager(tmp.path());

    let first = manager.load_view(&screen(COMPASS)).unwrap();
    let second = manager.load_view(&screen(COMPASS)).unwrap();
    drop(first);

    // Dropping one view leaves the other's bundle loaded
    assert_eq!(second.class_name(), COMPASS);
}
