use owo_colors::Rgb;

pub(crate) const FG1: Rgb = Rgb(163, 83, 207);
pub(crate) const FG2: Rgb = Rgb(90, 70, 130);
