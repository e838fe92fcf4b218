use std::fmt::Display;
use std::path::{Path, PathBuf};

use eframe::egui;
use image::DynamicImage;
use log::{error, info, warn};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

use eye_annotate::assist::run_assist;
use eye_annotate::detector::{DetectorKind, DetectorRegistry};
use eye_annotate::geometry::{points_on_ellipse, Ellipse, Point};
use eye_annotate::input::{EventKind, InputEvent, Key, Modifiers, PointerButton};
use eye_annotate::session::Session;
use eye_annotate::settings::{DetectorChoice, Settings, DISABLED};
use eye_annotate::{AnnotationError, Annotator, Category, FitResult, Outcome};

pub const TITLE: &str = "EyE Annotation Tool";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];
const POINT_RADIUS: f32 = 3.0;
const ELLIPSE_SEGMENTS: usize = 90;
/// Scroll distance egui reports for one wheel notch in point units.
const POINTS_PER_NOTCH: f32 = 50.0;

// ── Colours ─────────────────────────────────────────────────────────────────

struct Palette {
    point: egui::Color32,
    selected: egui::Color32,
    outline: egui::Color32,
}

fn palette(category: Category) -> Palette {
    let rgb = egui::Color32::from_rgb;
    match category {
        Category::Pupil => Palette {
            point: rgb(150, 213, 116),
            selected: rgb(249, 248, 113),
            outline: rgb(0, 127, 118),
        },
        Category::Iris => Palette {
            point: rgb(194, 149, 188),
            selected: rgb(249, 178, 208),
            outline: rgb(139, 122, 162),
        },
        Category::EyelidContour => Palette {
            point: rgb(0, 155, 201),
            selected: rgb(0, 189, 194),
            outline: rgb(0, 155, 201),
        },
        Category::Glint => Palette {
            point: rgb(255, 165, 0),
            selected: rgb(255, 215, 0),
            outline: rgb(255, 165, 0),
        },
    }
}

// ── Dialogs ─────────────────────────────────────────────────────────────────

fn show_message(level: MessageLevel, title: &str, message: impl Display) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(message.to_string())
        .set_buttons(MessageButtons::Ok)
        .show();
}

fn ask(title: &str, message: impl Display, buttons: MessageButtons) -> MessageDialogResult {
    MessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title(title)
        .set_description(message.to_string())
        .set_buttons(buttons)
        .show()
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct EyeAnnotateApp {
    annotator: Annotator,
    session: Session,
    registry: DetectorRegistry,
    settings: Settings,
    settings_path: PathBuf,

    texture: Option<egui::TextureHandle>,
    raw_image: Option<DynamicImage>,

    wheel_accum: f32,
    allow_close: bool,
    title: String,
}

impl EyeAnnotateApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        images: Vec<PathBuf>,
        settings: Settings,
        settings_path: PathBuf,
    ) -> Self {
        cc.egui_ctx.options_mut(|o| o.zoom_with_keyboard = false);

        let mut app = Self {
            annotator: Annotator::new(),
            session: Session::new(),
            registry: DetectorRegistry::with_builtin(),
            settings,
            settings_path,
            texture: None,
            raw_image: None,
            wheel_accum: 0.0,
            allow_close: false,
            title: String::new(),
        };
        app.load_images(images);
        app
    }

    fn record(&mut self, outcome: Outcome) {
        self.session.record(outcome);
    }

    // ── Images ──────────────────────────────────────────────────────────────

    fn open_image(&mut self, index: usize) {
        if let Err(err) = self.session.open(index, &mut self.annotator) {
            error!("cannot open image {index}: {err}");
            show_message(MessageLevel::Error, "Cannot open image", err);
            return;
        }
        self.reload_image();
    }

    /// Replaces the image list; on failure the current image stays open.
    fn load_images(&mut self, images: Vec<PathBuf>) {
        if let Err(err) = self.session.load_images(images, &mut self.annotator) {
            error!("cannot open the first image of the new list: {err}");
            show_message(MessageLevel::Error, "Cannot open image", err);
            return;
        }
        self.reload_image();
    }

    fn reload_image(&mut self) {
        self.texture = None;
        self.raw_image = self.session.current_path().and_then(|path| {
            image::open(path)
                .map_err(|err| warn!("cannot decode {}: {err}", path.display()))
                .ok()
        });
    }

    /// Navigates after giving the user a chance to keep unsaved work.
    fn goto(&mut self, index: usize) {
        if Some(index) == self.session.current_index() || !self.confirm_discard() {
            return;
        }
        self.open_image(index);
    }

    fn goto_next(&mut self) {
        if self.session.has_next() {
            let index = self.session.current_index().map_or(0, |i| i + 1);
            self.goto(index);
        }
    }

    fn goto_previous(&mut self) {
        if let Some(i) = self.session.current_index().filter(|&i| i > 0) {
            self.goto(i - 1);
        }
    }

    fn load_images_dialog(&mut self) {
        if !self.confirm_discard() {
            return;
        }
        let Some(mut paths) = rfd::FileDialog::new()
            .set_title("Load images")
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_files()
        else {
            return;
        };
        paths.sort();
        self.load_images(paths);
    }

    // ── Saving ──────────────────────────────────────────────────────────────

    /// Returns true when nothing is left unsaved.
    fn save(&mut self) -> bool {
        let Some(path) = self.session.annotation_path() else {
            return true;
        };
        if path.exists() {
            let answer = ask(
                "Overwrite annotation",
                format!("{} already exists. Overwrite it?", display_name(&path)),
                MessageButtons::YesNo,
            );
            if !matches!(answer, MessageDialogResult::Yes) {
                return false;
            }
        }
        match self.session.save(&self.annotator) {
            Ok(_) => true,
            Err(err) => {
                error!("saving {} failed: {err}", path.display());
                show_message(MessageLevel::Error, "Save failed", err);
                false
            }
        }
    }

    /// Asks about unsaved changes. False means the caller should stop.
    fn confirm_discard(&mut self) -> bool {
        if !self.session.is_modified() {
            return true;
        }
        match ask(
            "Unsaved changes",
            "The current annotation has unsaved changes. Save them first?",
            MessageButtons::YesNoCancel,
        ) {
            MessageDialogResult::Yes => self.save(),
            MessageDialogResult::No => true,
            _ => false,
        }
    }

    // ── Commands ────────────────────────────────────────────────────────────

    fn fit(&mut self) {
        match self.annotator.fit_annotation() {
            Ok(result) => {
                if let FitResult::Fitted(e) = result {
                    info!("fitted ellipse at ({:.1}, {:.1})", e.center.x, e.center.y);
                }
                self.record(result.outcome());
            }
            Err(err @ AnnotationError::NotEnoughPoints { .. }) => {
                show_message(MessageLevel::Warning, "Not enough points", err);
            }
            Err(err) => {
                error!("ellipse fit failed: {err}");
                show_message(MessageLevel::Error, "Fit failed", err);
            }
        }
    }

    fn assist(&mut self) {
        let Some(path) = self.session.current_path().map(Path::to_path_buf) else {
            return;
        };
        let report = run_assist(&mut self.annotator, &self.registry, &self.settings, &path);
        self.record(report.outcome);

        let mut problems: Vec<String> = report
            .failures
            .iter()
            .map(|f| format!("{} detector \"{}\": {}", f.kind, f.detector, f.message))
            .collect();
        problems.extend(
            report
                .missing
                .iter()
                .map(|(kind, name)| format!("{kind} detector \"{name}\" is not available")),
        );
        if !problems.is_empty() {
            show_message(MessageLevel::Warning, "AI assist", problems.join("\n"));
        }
    }

    fn undo(&mut self) {
        let outcome = self.annotator.undo();
        self.record(outcome);
    }

    fn redo(&mut self) {
        let outcome = self.annotator.redo();
        self.record(outcome);
    }

    fn choose_detector(&mut self, kind: DetectorKind, choice: DetectorChoice) {
        if self.settings.detector(kind) == choice {
            return;
        }
        self.settings.set_detector(kind, choice);
        if let Err(err) = self.settings.save(&self.settings_path) {
            warn!("cannot save settings: {err}");
        }
    }

    // ── Canvas ──────────────────────────────────────────────────────────────

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(ref img) = self.raw_image {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture(
                "eye-image",
                color_image,
                egui::TextureOptions::LINEAR,
            ));
        }
    }

    fn to_screen(&self, canvas: egui::Rect, p: Point) -> egui::Pos2 {
        let s = self.annotator.viewport().image_to_screen(p);
        canvas.min + egui::vec2(s.x as f32, s.y as f32)
    }

    /// Feeds this frame's raw egui events to the annotator in canvas-local
    /// coordinates.
    fn handle_canvas_input(&mut self, ctx: &egui::Context, canvas: egui::Rect, hovered: bool) {
        let events = ctx.input(|i| i.events.clone());
        let local = |pos: egui::Pos2| {
            Point::new(
                f64::from(pos.x - canvas.min.x),
                f64::from(pos.y - canvas.min.y),
            )
        };
        let center = local(canvas.center());
        let mut last_pos = ctx.input(|i| i.pointer.latest_pos()).map_or(center, local);

        for event in events {
            let translated = match event {
                egui::Event::PointerMoved(pos) => {
                    last_pos = local(pos);
                    Some(InputEvent::moved(last_pos))
                }
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                } => {
                    // Presses must start on the canvas; releases always pass.
                    let on_canvas = hovered && canvas.contains(pos);
                    map_button(button).filter(|_| on_canvas || !pressed).map(|button| {
                        let kind = if pressed {
                            EventKind::Press(button)
                        } else {
                            EventKind::Release(button)
                        };
                        InputEvent::new(kind, local(pos), map_modifiers(modifiers))
                    })
                }
                egui::Event::MouseWheel { unit, delta, modifiers } if hovered => {
                    self.wheel_accum += match unit {
                        egui::MouseWheelUnit::Line => delta.y,
                        egui::MouseWheelUnit::Point => delta.y / POINTS_PER_NOTCH,
                        egui::MouseWheelUnit::Page => delta.y * 3.0,
                    };
                    let notches = self.wheel_accum.trunc();
                    self.wheel_accum -= notches;
                    (notches != 0.0).then(|| {
                        InputEvent::wheel(notches as i32, last_pos, map_modifiers(modifiers))
                    })
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers,
                    ..
                } => map_key(key, modifiers).map(|key| {
                    let at = if matches!(key, Key::ZoomIn | Key::ZoomOut) {
                        center
                    } else {
                        Point::default()
                    };
                    InputEvent::new(EventKind::Key(key), at, map_modifiers(modifiers))
                }),
                _ => None,
            };

            if let Some(input) = translated {
                let outcome = self.annotator.handle(&input);
                self.record(outcome);
            }
        }
    }

    fn draw_annotations(&self, painter: &egui::Painter, canvas: egui::Rect) {
        let state = self.annotator.state();
        let current = state.current_category();

        for category in Category::ALL {
            let colors = palette(category);

            if let Some(ellipse) = state.ellipse(category) {
                self.draw_ellipse(painter, canvas, ellipse, colors.outline);
            }

            let points = state.points(category);
            if category == Category::EyelidContour && points.len() > 1 {
                let line = points.iter().map(|&p| self.to_screen(canvas, p)).collect();
                painter.add(egui::Shape::line(line, egui::Stroke::new(1.5, colors.outline)));
            }

            for (i, &p) in points.iter().enumerate() {
                let selected = category == current && state.selected() == Some(i);
                let color = if selected { colors.selected } else { colors.point };
                let radius = if selected { POINT_RADIUS + 1.5 } else { POINT_RADIUS };
                painter.circle_filled(self.to_screen(canvas, p), radius, color);
            }
        }
    }

    fn draw_ellipse(
        &self,
        painter: &egui::Painter,
        canvas: egui::Rect,
        ellipse: &Ellipse,
        color: egui::Color32,
    ) {
        let outline = points_on_ellipse(ellipse, ELLIPSE_SEGMENTS)
            .into_iter()
            .map(|p| self.to_screen(canvas, p))
            .collect();
        painter.add(egui::Shape::closed_line(outline, egui::Stroke::new(2.0, color)));
    }

    fn update_title(&mut self, ctx: &egui::Context) {
        let title = match self.session.current_path() {
            Some(path) => {
                let marker = if self.session.is_modified() { " *" } else { "" };
                format!("{TITLE} - {}{marker}", display_name(path))
            }
            None => TITLE.to_owned(),
        };
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let current = self.annotator.state().current_category();
            for category in Category::ALL {
                if ui.selectable_label(current == category, category.label()).clicked() {
                    self.annotator.set_category(category);
                }
            }
            ui.separator();

            let has_image = self.session.current_path().is_some();
            if ui.add_enabled(current.has_ellipse(), egui::Button::new("Fit ellipse")).clicked() {
                self.fit();
            }
            if ui.button("Clear points").clicked() {
                let outcome = self.annotator.clear_points(current);
                self.record(outcome);
            }
            if ui.add_enabled(current.has_ellipse(), egui::Button::new("Clear ellipse")).clicked() {
                let outcome = self.annotator.clear_selected_ellipse();
                self.record(outcome);
            }
            if ui.button("Clear all").clicked() {
                let outcome = self.annotator.clear_all();
                self.record(outcome);
            }
            ui.separator();
            if ui.add_enabled(has_image, egui::Button::new("AI assist")).clicked() {
                self.assist();
            }
            self.detector_menu(ui);
            ui.separator();
            if ui.add_enabled(self.annotator.can_undo(), egui::Button::new("Undo")).clicked() {
                self.undo();
            }
            if ui.add_enabled(self.annotator.can_redo(), egui::Button::new("Redo")).clicked() {
                self.redo();
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.annotator.viewport().zoom() * 100.0));
        });
    }

    fn detector_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Detectors", |ui| {
            for kind in DetectorKind::ALL {
                ui.label(egui::RichText::new(kind.label()).strong());
                let selected = self.settings.value(kind).to_owned();
                let mut choice = None;
                if ui.radio(selected == DISABLED, "Disabled").clicked() {
                    choice = Some(DetectorChoice::Disabled);
                }
                for name in self.registry.names(kind) {
                    if ui.radio(selected == name, name).clicked() {
                        choice = Some(DetectorChoice::Named(name.to_owned()));
                    }
                }
                if let Some(choice) = choice {
                    self.choose_detector(kind, choice);
                }
                ui.separator();
            }
        });
    }

    fn image_list(&mut self, ui: &mut egui::Ui) {
        if ui.button("Load images…").clicked() {
            self.load_images_dialog();
        }
        ui.horizontal(|ui| {
            if ui.add_enabled(self.session.has_previous(), egui::Button::new("◀ Prev")).clicked() {
                self.goto_previous();
            }
            if ui.add_enabled(self.session.has_next(), egui::Button::new("Next ▶")).clicked() {
                self.goto_next();
            }
        });
        let can_save = self.session.current_path().is_some();
        if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
            self.save();
        }
        ui.separator();

        let current = self.session.current_index();
        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (i, path) in self.session.images().iter().enumerate() {
                if ui.selectable_label(current == Some(i), display_name(path)).clicked() {
                    clicked = Some(i);
                }
            }
        });
        if let Some(i) = clicked {
            self.goto(i);
        }
    }

    fn shortcuts(&mut self, ctx: &egui::Context) {
        let command_shift = egui::Modifiers::COMMAND | egui::Modifiers::SHIFT;
        if ctx.input_mut(|i| i.consume_key(command_shift, egui::Key::Z)) {
            self.redo();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z)) {
            self.undo();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S)) {
            self.save();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::ArrowRight)) {
            self.goto_next();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::ArrowLeft)) {
            self.goto_previous();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        _ => None,
    }
}

fn map_modifiers(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: m.shift,
        ctrl: m.command || m.ctrl,
        alt: m.alt,
    }
}

fn map_key(key: egui::Key, modifiers: egui::Modifiers) -> Option<Key> {
    match key {
        egui::Key::Delete | egui::Key::Backspace => Some(Key::Delete),
        egui::Key::Tab => Some(Key::Tab),
        egui::Key::Plus | egui::Key::Equals if modifiers.command => Some(Key::ZoomIn),
        egui::Key::Minus if modifiers.command => Some(Key::ZoomOut),
        _ => None,
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for EyeAnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.allow_close {
            if self.confirm_discard() {
                self.allow_close = true;
            } else {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            }
        }

        self.ensure_texture(ctx);
        self.shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::left("images")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| self.image_list(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
                let canvas = response.rect;

                self.handle_canvas_input(ctx, canvas, response.hovered());

                painter.rect_filled(canvas, 0.0, egui::Color32::from_gray(40));
                let image_size = self.annotator.viewport().image_size();
                if let (Some(tex), Some((w, h))) = (&self.texture, image_size) {
                    let img_rect = egui::Rect::from_min_max(
                        self.to_screen(canvas, Point::new(0.0, 0.0)),
                        self.to_screen(canvas, Point::new(w, h)),
                    );
                    painter.image(
                        tex.id(),
                        img_rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
                self.draw_annotations(&painter, canvas);

                if self.session.current_path().is_none() {
                    painter.text(
                        canvas.center(),
                        egui::Align2::CENTER_CENTER,
                        "Load images to start annotating",
                        egui::FontId::proportional(18.0),
                        egui::Color32::from_gray(160),
                    );
                }
            });

        self.update_title(ctx);
    }
}
