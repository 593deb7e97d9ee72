//! Extension bundle loaded as a real dynamic library by the native tests.

use anyhow::anyhow;
use mpt_extensions::{ClassRegistry, Context, PrayerView};

struct NativeView {
    class_name: String,
    context: Context,
}

impl PrayerView for NativeView {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn context(&self) -> &Context {
        &self.context
    }
}

fn compass(context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    Ok(Box::new(NativeView {
        class_name: String::from("com.example.native.CompassView"),
        context,
    }))
}

fn refusing(_context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    Err(anyhow!(String::from("constructor refused")))
}

fn exploding(_context: Context) -> anyhow::Result<Box<dyn PrayerView>> {
    panic!("constructor exploded")
}

fn register(registry: &mut ClassRegistry) {
    registry.register("com.example.native.CompassView", compass);
    registry.register("com.example.native.RefusingView", refusing);
    registry.register("com.example.native.ExplodingView", exploding);
}

mpt_extensions::export_views!(register);
