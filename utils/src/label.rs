use std::fmt::Display;

// Block labels are generated from the block-id space: id 0 is the entry
// block, every other id prints as "B<id>". Labels outside that shape
// (runtime symbols, outlined function names) never name a block.
pub const ENTRY_LABEL: &str = "entry";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
	pub name: String,
}

impl Display for Label {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.name)
	}
}

impl Label {
	pub fn new(name: impl Display) -> Self {
		Label {
			name: name.to_string(),
		}
	}
}

pub fn to_label(id: i32) -> Label {
	match id {
		0 => Label::new(ENTRY_LABEL),
		_ => Label::new(format!("B{}", id)),
	}
}

// The inverse of to_label over this ir's block-id space.
pub fn from_label(label: &Label) -> Option<i32> {
	if label.name == ENTRY_LABEL {
		return Some(0);
	}
	label
		.name
		.strip_prefix('B')
		.and_then(|v| v.parse().ok())
		.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_block_ids() {
		assert_eq!(from_label(&to_label(0)), Some(0));
		assert_eq!(from_label(&to_label(17)), Some(17));
		assert_eq!(from_label(&Label::new("entry")), Some(0));
	}

	#[test]
	fn non_block_labels_have_no_id() {
		assert_eq!(from_label(&Label::new("__cilkrts_cilk_for_32")), None);
		assert_eq!(from_label(&Label::new("main.body.1")), None);
		assert_eq!(from_label(&Label::new("B")), None);
		assert_eq!(from_label(&Label::new("B0")), None);
	}
}
