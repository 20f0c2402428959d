use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use std::fs;
use std::time::Instant;

use crate::overlay::{
    AnnotationDocument, AnnotationStore, CombineMode, OverlayTool, SaveState, SyncScheduler,
    ToolSettings,
};
use crate::viewer::SliceStack;

use super::StatusLine;

/// Main toolbar: tool selection, edit actions, import/export.
#[allow(clippy::too_many_arguments)]
pub fn toolbar_ui(
    mut contexts: EguiContexts,
    mut settings: ResMut<ToolSettings>,
    mut store: ResMut<AnnotationStore>,
    mut scheduler: ResMut<SyncScheduler>,
    mut save: ResMut<SaveState>,
    mut status: ResMut<StatusLine>,
    stack: Res<SliceStack>,
) -> Result {
    egui::TopBottomPanel::top("main_toolbar")
        .frame(
            egui::Frame::side_top_panel(&contexts.ctx_mut()?.style())
                .inner_margin(egui::Margin::symmetric(12, 8)),
        )
        .show(contexts.ctx_mut()?, |ui| {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 4.0;

                // Tool buttons with keyboard shortcuts
                for tool in OverlayTool::all() {
                    let selected = settings.tool == *tool;
                    let button = egui::Button::new(
                        egui::RichText::new(tool_button_label(tool)).size(14.0).strong(),
                    )
                    .min_size(egui::vec2(0.0, 28.0))
                    .selected(selected);

                    let response = ui.add(button);
                    if response.clicked() && settings.tool != *tool {
                        store.discard_stroke();
                        scheduler.set_stroke_active(false);
                        scheduler.on_pointer_activity();
                        settings.tool = *tool;
                    }
                    response.on_hover_text(tool.display_name());
                }

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                if ui
                    .add_enabled(store.can_undo(), egui::Button::new("Undo"))
                    .on_hover_text("Ctrl+Z")
                    .clicked()
                    && store.undo()
                {
                    scheduler.mark_all_dirty();
                    save.note_edit(Instant::now());
                }
                if ui
                    .add_enabled(store.can_redo(), egui::Button::new("Redo"))
                    .on_hover_text("Ctrl+Y")
                    .clicked()
                    && store.redo()
                {
                    scheduler.mark_all_dirty();
                    save.note_edit(Instant::now());
                }
                if ui.button("Clear All").clicked() {
                    store.clear_all();
                    scheduler.mark_all_dirty();
                    save.note_edit(Instant::now());
                    status.set("Cleared all annotations");
                }

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                if ui.button("Import...").clicked()
                    && let Some(path) = rfd::FileDialog::new()
                        .add_filter("Annotation Files", &["json"])
                        .set_title("Import Annotations")
                        .pick_file()
                {
                    match fs::read_to_string(&path)
                        .map_err(|e| e.to_string())
                        .and_then(|json| {
                            serde_json::from_str::<AnnotationDocument>(&json)
                                .map_err(|e| e.to_string())
                        }) {
                        Ok(document) => {
                            let slices = document.slices.len();
                            document.apply_to_store(&mut store);
                            scheduler.mark_all_dirty();
                            save.note_edit(Instant::now());
                            status.set(format!("Imported {slices} slices"));
                        }
                        Err(e) => {
                            warn!("import failed: {e}");
                            status.set(format!("Import failed: {e}"));
                        }
                    }
                }

                if ui.button("Export...").clicked()
                    && let Some(path) = rfd::FileDialog::new()
                        .add_filter("Annotation Files", &["json"])
                        .set_file_name("annotations.json")
                        .set_title("Export Annotations")
                        .save_file()
                {
                    let document = AnnotationDocument::from_store(&store);
                    match serde_json::to_string_pretty(&document)
                        .map_err(|e| e.to_string())
                        .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()))
                    {
                        Ok(()) => status.set(format!("Exported to {}", path.display())),
                        Err(e) => {
                            warn!("export failed: {e}");
                            status.set(format!("Export failed: {e}"));
                        }
                    }
                }

                if ui.button("Save").clicked() {
                    save.request_save();
                }

                // Right-aligned status and slice indicator
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if stack.count() > 0 {
                        ui.label(
                            egui::RichText::new(format!(
                                "Slice {}/{}",
                                stack.current + 1,
                                stack.count()
                            ))
                            .strong(),
                        );
                        ui.add_space(8.0);
                    }
                    if save.in_flight() {
                        ui.colored_label(egui::Color32::from_rgb(200, 180, 100), "Saving...");
                    } else if save.is_dirty() {
                        ui.colored_label(egui::Color32::GRAY, "Unsaved changes");
                    }
                    if let Some(message) = &status.message {
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new(message).color(egui::Color32::GRAY).size(11.0));
                    }
                });
            });
        });
    Ok(())
}

/// Secondary toolbar showing settings for the active tool
pub fn tool_settings_ui(
    mut contexts: EguiContexts,
    mut settings: ResMut<ToolSettings>,
) -> Result {
    if settings.tool == OverlayTool::None {
        return Ok(());
    }

    egui::TopBottomPanel::top("tool_settings")
        .frame(
            egui::Frame::side_top_panel(&contexts.ctx_mut()?.style())
                .inner_margin(egui::Margin::symmetric(12, 6))
                .fill(egui::Color32::from_rgb(45, 45, 48)),
        )
        .show(contexts.ctx_mut()?, |ui| {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 6.0;

                ui.label(
                    egui::RichText::new(format!("{} Settings:", tool_name(settings.tool)))
                        .color(egui::Color32::LIGHT_GRAY),
                );
                ui.add_space(8.0);

                if matches!(settings.tool, OverlayTool::Brush | OverlayTool::Eraser) {
                    ui.label("Radius:");
                    ui.add(
                        egui::DragValue::new(&mut settings.brush_radius)
                            .range(1.0..=100.0)
                            .speed(0.5)
                            .suffix(" px"),
                    );
                    ui.add_space(12.0);
                    ui.separator();
                    ui.add_space(12.0);
                }

                ui.label("Combine:");
                egui::ComboBox::from_id_salt("combine_mode_select")
                    .selected_text(settings.combine_mode.display_name())
                    .width(100.0)
                    .show_ui(ui, |ui| {
                        for mode in CombineMode::all() {
                            let is_selected = settings.combine_mode == *mode;
                            if ui.selectable_label(is_selected, mode.display_name()).clicked() {
                                settings.combine_mode = *mode;
                            }
                        }
                    });

                ui.add_space(12.0);
                ui.label(
                    egui::RichText::new(hint_text(settings.tool))
                        .color(egui::Color32::GRAY)
                        .size(11.0),
                );
            });
        });
    Ok(())
}

fn tool_button_label(tool: &OverlayTool) -> &'static str {
    match tool {
        OverlayTool::None => "Navigate [N]",
        OverlayTool::Brush => "Brush [B]",
        OverlayTool::Eraser => "Eraser [E]",
        OverlayTool::Freehand => "Freehand [F]",
        OverlayTool::Polygon => "Polygon [P]",
    }
}

fn tool_name(tool: OverlayTool) -> &'static str {
    match tool {
        OverlayTool::None => "Navigate",
        OverlayTool::Brush => "Brush",
        OverlayTool::Eraser => "Eraser",
        OverlayTool::Freehand => "Freehand",
        OverlayTool::Polygon => "Polygon",
    }
}

fn hint_text(tool: OverlayTool) -> &'static str {
    match tool {
        OverlayTool::None => "",
        OverlayTool::Brush => "Drag to paint, right-drag to erase, Esc cancels",
        OverlayTool::Eraser => "Drag to erase, Esc cancels",
        OverlayTool::Freehand => "Drag to outline, release to close",
        OverlayTool::Polygon => "Click to place vertices, click the start point to close",
    }
}
