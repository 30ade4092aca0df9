pub fn increment(x: &mut i32) -> i32 {
	*x += 1;
	*x
}
