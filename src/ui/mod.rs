mod toolbar;

use bevy::prelude::*;
use bevy_egui::EguiPrimaryContextPass;

/// Transient status message shown at the right edge of the toolbar.
#[derive(Resource, Default)]
pub struct StatusLine {
    pub message: Option<String>,
}

impl StatusLine {
    pub fn set(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StatusLine>().add_systems(
            EguiPrimaryContextPass,
            (toolbar::toolbar_ui, toolbar::tool_settings_ui).chain(),
        );
    }
}
