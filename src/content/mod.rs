//! Content generation: facts and their illustrations

mod fact;
mod image;

pub use fact::{
    build_prompt, extract_json_object, parse_fact, truncate_title, Fact, FactGenerator,
    MAX_TITLE_CHARS,
};
pub use image::{build_image_prompt, Illustrator};
