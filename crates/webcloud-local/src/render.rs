//! Layout handoff for wordcloud2-style engines.
//!
//! The renderer does not rasterize anything: it emits the `[[term, weight], ...]` list and the
//! option object such engines consume, after a coarse fit check against the canvas so that
//! terms the engine would silently drop are shrunk or reported instead.

use crate::tokenize::is_hangul_syllable;
use serde_json::json;
use tracing::debug;
use webcloud_core::{Error, RenderConfig, RenderOutput, Renderer, Result, WeightedTerm};

/// Hangul glyphs are roughly square; Latin glyphs and digits average a bit over half an em.
const HANGUL_EM: f64 = 1.0;
const OTHER_EM: f64 = 0.6;
/// Terms that would have to shrink below this font size are omitted instead.
pub const MIN_LEGIBLE_PX: f64 = 8.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct Wordcloud2ListRenderer;

fn em_width(term: &str) -> f64 {
    term.chars()
        .map(|c| if is_hangul_syllable(c) { HANGUL_EM } else { OTHER_EM })
        .sum()
}

/// Largest font size at which `term` still fits on one canvas line.
fn max_fitting_size(term: &str, cfg: &RenderConfig) -> f64 {
    let ems = em_width(term).max(OTHER_EM);
    let by_width = f64::from(cfg.width) / ems;
    by_width.min(f64::from(cfg.height))
}

impl Renderer for Wordcloud2ListRenderer {
    fn name(&self) -> &'static str {
        "wordcloud2_list"
    }

    fn render(&self, terms: &[WeightedTerm], cfg: &RenderConfig) -> Result<RenderOutput> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(Error::RenderFailure(format!(
                "canvas {}x{} has no area",
                cfg.width, cfg.height
            )));
        }

        let mut list = Vec::with_capacity(terms.len());
        let mut omitted = Vec::new();
        for t in terms {
            if !t.weight.is_finite() || t.weight <= 0.0 {
                omitted.push(t.term.clone());
                continue;
            }
            let limit = max_fitting_size(&t.term, cfg);
            if t.weight <= limit || cfg.draw_out_of_bound {
                list.push(json!([t.term, t.weight]));
            } else if cfg.shrink_to_fit && limit >= MIN_LEGIBLE_PX {
                debug!(term = %t.term, weight = t.weight, limit, "shrinking term to fit canvas");
                list.push(json!([t.term, limit.floor()]));
                omitted.push(t.term.clone());
            } else {
                debug!(term = %t.term, weight = t.weight, limit, "term does not fit canvas");
                omitted.push(t.term.clone());
            }
        }

        if list.is_empty() {
            return Err(Error::RenderFailure(format!(
                "none of {} terms fit a {}x{} canvas",
                terms.len(),
                cfg.width,
                cfg.height
            )));
        }

        let doc = json!({
            "list": list,
            "options": {
                "width": cfg.width,
                "height": cfg.height,
                "gridSize": cfg.grid_size(),
                "weightFactor": 1,
                "fontFamily": cfg.font_family,
                "backgroundColor": cfg.background_color,
                "rotateRatio": cfg.rotate_ratio,
                "rotationSteps": cfg.rotation_steps,
                "shuffle": cfg.shuffle,
                "drawOutOfBound": cfg.draw_out_of_bound,
                "shrinkToFit": cfg.shrink_to_fit,
                "palette": cfg.palette,
            }
        });
        let bytes = serde_json::to_vec(&doc).map_err(|e| Error::RenderFailure(e.to_string()))?;
        Ok(RenderOutput {
            engine: self.name(),
            content_type: "application/json",
            bytes,
            omitted,
        })
    }
}
