use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

macro_rules! generate_benchmarks {
	($( $input:expr_2021 ),* $(,)?) => {
		fn tokenize_bench(c: &mut Criterion) {
			$(
				c.bench_function(concat!("tokenize ", $input), |b| {
					b.iter(|| {
						let _ = black_box(math_parser::tokenize($input)).unwrap();
					});
				});
			)*
		}

		fn parsing_bench(c: &mut Criterion) {
			$(
				c.bench_function(concat!("parse ", $input), |b| {
					b.iter(|| {
						let _ = black_box(math_parser::parse($input)).unwrap();
					});
				});
			)*
		}

		criterion_group!(benches, tokenize_bench, parsing_bench);
		criterion_main!(benches);
	};
}

generate_benchmarks! {
	"(3 * (4 + sqrt(25)) - cos(pi / 3) * 2 ** 3) + 5 * e", // Mixed nested calls, constants and operators
	"((5 + 2 * (3 - sqrt(49))) ** 2) / (1 + sqrt(16)) + tau / 2",
	"max(a, b) << 2 >= min(c * 2, d) + 1", // Shifts and comparisons
	"\"prefix \" + name + \" suffix\"", // String concatenation
	"-x ** 2 + -(y - 3) * +z",
}
