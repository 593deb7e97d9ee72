//! Integration tests for sandboxed view loading

mod support;

use anyhow::bail;
use mpt_extensions::loader::{
    Constructor, ContextFactory, PackageContextFactory, StaticBundleOpener, ViewClass,
};
use mpt_extensions::{
    ClassRegistry, Context, ExtensionManager, PackageManager, PrayerView, SandboxedLoader, Screen,
    EXTENSION_PERMISSION,
};
use std::fs;
use std::sync::Arc;
use support::{bundle_path, FakePackageManager, RecordingView};
use tempfile::TempDir;

const QIBLA: &str = "com.example.qibla";
const COMPASS: &str = "com.example.qibla.CompassView";

fn compass_view(context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    Ok(RecordingView::new(COMPASS, context))
}

fn map_view(context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    Ok(RecordingView::new("com.example.qibla.MapView", context))
}

fn failing_view(_context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    bail!("location service unavailable")
}

fn panicking_view(_context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    panic!("view constructor exploded")
}

fn no_arg_view() -> anyhow::Result<Box<dyn PrayerView>> {
    bail!("only reachable through a default constructor")
}

fn shared_view(context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    Ok(RecordingView::new("com.host.SharedView", context))
}

fn register_qibla(registry: &mut ClassRegistry) {
    registry.register(COMPASS, compass_view);
    registry.register("com.example.qibla.MapView", map_view);
    registry.register("com.example.qibla.FailingView", failing_view);
    registry.register("com.example.qibla.PanickingView", panicking_view);
    registry.define(
        ViewClass::new("com.example.qibla.PlainView")
            .with_constructor(Constructor::no_args(no_arg_view)),
    );
}

fn packages() -> Arc<FakePackageManager> {
    Arc::new(
        FakePackageManager::new()
            .with_package(
                QIBLA,
                &[EXTENSION_PERMISSION, "android.permission.ACCESS_FINE_LOCATION"],
                Some("<mpt-extension/>"),
            )
            .with_package(
                "com.example.revoked",
                &["android.permission.INTERNET"],
                None,
            ),
    )
}

fn loader(packages: Arc<FakePackageManager>) -> SandboxedLoader {
    let opener = StaticBundleOpener::new()
        .with_bundle(bundle_path(QIBLA), register_qibla)
        .with_bundle(bundle_path("com.example.revoked"), register_qibla);

    SandboxedLoader::new(packages).with_bundle_opener(Arc::new(opener))
}

fn screen(apk: &str, view: &str) -> Screen {
    Screen::new(apk, Some("Screen".to_string()), Some(view.to_string()))
}

#[test]
fn test_load_view_with_restricted_context() {
    let view = loader(packages()).load_view(&screen(QIBLA, COMPASS)).unwrap();

    assert_eq!(view.class_name(), COMPASS);
    assert_eq!(view.bundle(), bundle_path(QIBLA));

    let context = view.context();
    assert_eq!(context.package_name(), QIBLA);
    assert!(context.is_restricted());
    assert!(context.check_permission("android.permission.ACCESS_FINE_LOCATION"));
    assert!(!context.check_permission("android.permission.CAMERA"));
}

#[test]
fn test_uninstalled_package_is_unavailable() {
    let loaded = loader(packages()).load_view(&screen("com.example.gone", COMPASS));
    assert!(loaded.is_none());
}

#[test]
fn test_unknown_class_is_unavailable() {
    let loaded = loader(packages()).load_view(&screen(QIBLA, "com.example.qibla.Missing"));
    assert!(loaded.is_none());
}

#[test]
fn test_class_without_context_constructor_is_unavailable() {
    let loaded = loader(packages()).load_view(&screen(QIBLA, "com.example.qibla.PlainView"));
    assert!(loaded.is_none());
}

#[test]
fn test_constructor_error_is_unavailable() {
    let loaded = loader(packages()).load_view(&screen(QIBLA, "com.example.qibla.FailingView"));
    assert!(loaded.is_none());
}

#[test]
fn test_constructor_panic_is_contained() {
    let loader = loader(packages());

    assert!(loader
        .load_view(&screen(QIBLA, "com.example.qibla.PanickingView"))
        .is_none());
    // The loader stays usable afterwards
    assert!(loader.load_view(&screen(QIBLA, COMPASS)).is_some());
}

#[test]
fn test_screen_without_view_is_unavailable() {
    let screen = Screen::new(QIBLA, Some("Compass".to_string()), None);
    assert!(loader(packages()).load_view(&screen).is_none());
}

#[test]
fn test_missing_bundle_is_unavailable() {
    let loader = SandboxedLoader::new(packages())
        .with_bundle_opener(Arc::new(StaticBundleOpener::new()));
    assert!(loader.load_view(&screen(QIBLA, COMPASS)).is_none());
}

#[test]
fn test_revoked_permission_is_rechecked() {
    let revoked = screen("com.example.revoked", COMPASS);

    assert!(loader(packages()).load_view(&revoked).is_none());

    let view = loader(packages())
        .with_permission_recheck(false)
        .load_view(&revoked)
        .unwrap();
    assert_eq!(view.context().package_name(), "com.example.revoked");
}

#[test]
fn test_denied_context_is_unavailable() {
    let packages = packages();
    let contexts: Arc<dyn ContextFactory> =
        Arc::new(PackageContextFactory::new(packages.clone()).with_denied([QIBLA]));

    let loaded = loader(packages)
        .with_context_factory(contexts)
        .load_view(&screen(QIBLA, COMPASS));
    assert!(loaded.is_none());
}

#[test]
fn test_host_classes_resolve_through_parent() {
    let mut host = ClassRegistry::new();
    host.register("com.host.SharedView", shared_view);

    let view = loader(packages())
        .with_host_classes(host)
        .load_view(&screen(QIBLA, "com.host.SharedView"))
        .unwrap();

    assert_eq!(view.class_name(), "com.host.SharedView");
    // Constructed with the owning package's context, not the host's
    assert_eq!(view.context().package_name(), QIBLA);
}

#[test]
fn test_host_class_shadows_bundle_class() {
    let mut host = ClassRegistry::new();
    host.register(COMPASS, shared_view);

    let view = loader(packages())
        .with_host_classes(host)
        .load_view(&screen(QIBLA, COMPASS))
        .unwrap();

    assert_eq!(view.class_name(), "com.host.SharedView");
}

#[test]
fn test_each_load_builds_a_fresh_view() {
    let loader = loader(packages());
    let compass = screen(QIBLA, COMPASS);

    let first = loader.load_view(&compass).unwrap();
    let second = loader.load_view(&compass).unwrap();

    let first_view = &*first as *const dyn PrayerView as *const ();
    let second_view = &*second as *const dyn PrayerView as *const ();
    assert_ne!(first_view, second_view);
    assert_eq!(first.context(), second.context());
}

#[test]
fn test_manager_loads_scanned_screens() {
    let tmp = TempDir::new().unwrap();
    let package_dir = tmp.path().join("qibla");
    fs::create_dir_all(package_dir.join("res/xml")).unwrap();
    fs::write(
        package_dir.join("package.toml"),
        format!(
            r#"
                package = "{QIBLA}"
                code = "libqibla.so"
                uses-permissions = ["{EXTENSION_PERMISSION}"]

                [meta-data]
                "com.i906.mpt.extension.ExtensionInfo" = "res/xml/extension.xml"
            "#
        ),
    )
    .unwrap();
    fs::write(
        package_dir.join("res/xml/extension.xml"),
        format!(
            r#"<mpt-extension name="Qibla">
                <screen name="Compass" view="{COMPASS}"/>
                <screen name="Missing" view="com.example.qibla.Missing"/>
            </mpt-extension>"#
        ),
    )
    .unwrap();

    let packages: Arc<dyn PackageManager> = Arc::new(
        mpt_extensions::DirectoryPackageManager::new(vec![tmp.path().to_path_buf()]),
    );
    let opener =
        StaticBundleOpener::new().with_bundle(package_dir.join("libqibla.so"), register_qibla);
    let manager = ExtensionManager::new(packages).with_bundle_opener(Arc::new(opener));

    let extensions = manager.scan();
    assert_eq!(extensions.len(), 1);

    let screens = &extensions[0].screens;
    let compass = manager.load_view(&screens[0]).unwrap();
    assert_eq!(compass.class_name(), COMPASS);
    assert_eq!(compass.context().data_dir(), package_dir);
    assert_eq!(
        compass.context().resource_path("cache/qibla.json"),
        Some(package_dir.join("cache/qibla.json"))
    );
    assert_eq!(compass.context().resource_path("../tasbih/secret"), None);

    assert!(manager.load_view(&screens[1]).is_none());
}
