use scogen_tui::{
    block::Block,
    coordinator::EditMode,
    manager::{DocumentManager, TextInput},
    markup,
    model::{Answer, Image, Question, Test},
    storage::{MemoryStorage, Storage, to_manifest_json},
    theme::Theme,
    view::{ViewState, navigation_order, render_test},
};
use std::time::{Duration, Instant};
use tdoc::{Document, InlineStyle, Paragraph, Span};

/// Performance benchmark suite for the test authoring view
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Block list rendering at several test sizes
/// - Manifest serialization and parsing
/// - Keystroke handling on the text surface
/// - Structural edits (add, move, remove)
const SMALL_TEST_QUESTIONS: usize = 10;
const MEDIUM_TEST_QUESTIONS: usize = 100;
const LARGE_TEST_QUESTIONS: usize = 1000;

const ITERATIONS: usize = 100;

const SAMPLE_WORDS: &[&str] = &[
    "Which", "river", "flows", "through", "the", "capital", "of", "Hungary", "and", "what",
    "is", "its", "length", "in", "kilometres", "measured", "from", "source", "to", "delta",
];

fn sentence(words: usize, offset: usize) -> String {
    (0..words)
        .map(|index| SAMPLE_WORDS[(index + offset) % SAMPLE_WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Questions stored as FTML, every third one with an image.
fn create_test(questions: usize, words_per_question: usize) -> Test {
    let mut test = Test::new();
    for index in 0..questions {
        let document = Document::new().with_paragraphs(vec![
            Paragraph::new_text().with_content(vec![Span::new_text(&sentence(
                words_per_question,
                index,
            ))]),
        ]);
        let text = markup::to_markup(&document).unwrap_or_else(|| sentence(words_per_question, index));
        let image = (index % 3 == 0).then(|| Image::new(format!("images/question-{index}.png")));
        let answers = (0..4)
            .map(|answer| Answer {
                text: sentence(6, index + answer),
                is_correct: answer == index % 4,
            })
            .collect();
        test.questions.push(Question {
            text,
            image,
            answers,
            collapsed: index % 10 == 9,
            visible: index % 7 != 6,
        });
    }
    test
}

/// Question text with bold and italic spans
fn create_styled_test(questions: usize) -> Test {
    let mut test = create_test(questions, 0);
    for (index, question) in test.questions.iter_mut().enumerate() {
        let text = format!("Question {index} with some bold and italic words to wrap.");
        let span = if index % 3 == 0 {
            Span::new_styled(InlineStyle::Bold).with_text(&text)
        } else if index % 5 == 0 {
            Span::new_styled(InlineStyle::Italic).with_text(&text)
        } else {
            Span::new_text(&text)
        };
        let document =
            Document::new().with_paragraphs(vec![Paragraph::new_text().with_content(vec![span])]);
        question.text = markup::to_markup(&document).unwrap_or(text);
    }
    test
}

fn create_manager(test: Test) -> DocumentManager {
    DocumentManager::with_test(test, Box::new(MemoryStorage::new()))
}

struct BenchmarkResult {
    name: String,
    iterations: usize,
    total_duration: Duration,
    avg_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n{}", "=".repeat(70));
        println!("Benchmark: {}", self.name);
        println!("{}", "=".repeat(70));
        println!("Iterations:     {}", self.iterations);
        println!("Total time:     {:?}", self.total_duration);
        println!("Average:        {:?}", self.avg_duration);
        println!("Min:            {:?}", self.min_duration);
        println!("Max:            {:?}", self.max_duration);
        println!(
            "Ops/sec:        {:.2}",
            1_000_000.0 / self.avg_duration.as_micros().max(1) as f64
        );

        if self.avg_duration.as_millis() > 100 {
            println!("\n⚠️  WARNING: Average duration > 100ms (user-perceptible lag)");
        } else if self.avg_duration.as_millis() > 16 {
            println!("\n⚠️  WARNING: Average duration > 16ms (may drop frames)");
        }
    }
}

fn benchmark<F>(name: &str, iterations: usize, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut durations = Vec::with_capacity(iterations);

    // Warmup
    for _ in 0..10 {
        f();
    }

    for _ in 0..iterations {
        let start = Instant::now();
        f();
        durations.push(start.elapsed());
    }

    let total_duration: Duration = durations.iter().sum();
    let avg_duration = total_duration / iterations as u32;
    let min_duration = *durations.iter().min().unwrap();
    let max_duration = *durations.iter().max().unwrap();

    BenchmarkResult {
        name: name.to_string(),
        iterations,
        total_duration,
        avg_duration,
        min_duration,
        max_duration,
    }
}

#[test]
fn bench_rendering_performance() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           RENDERING PERFORMANCE BENCHMARKS                     ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let theme = Theme::default();
    let tests = vec![
        (
            "Small (10 questions)",
            create_test(SMALL_TEST_QUESTIONS, 20),
        ),
        (
            "Medium (100 questions)",
            create_test(MEDIUM_TEST_QUESTIONS, 20),
        ),
        (
            "Large (1000 questions)",
            create_test(LARGE_TEST_QUESTIONS, 20),
        ),
    ];

    for (name, test) in tests {
        let manager = create_manager(test);
        let view = ViewState {
            selected: manager.blocks().first().map(|block| block.id()),
            grabbed: None,
        };
        let result = benchmark(&format!("render_test - {name}"), ITERATIONS, || {
            let _ = render_test(&manager, 80, view, &theme);
        });
        result.print();
    }
}

#[test]
fn bench_rendering_with_styles() {
    let theme = Theme::default();
    let manager = create_manager(create_styled_test(MEDIUM_TEST_QUESTIONS));
    let result = benchmark("render_test - styled markup", ITERATIONS, || {
        let _ = render_test(&manager, 80, ViewState::default(), &theme);
    });
    result.print();
}

#[test]
fn bench_wrap_width_impact() {
    let theme = Theme::default();
    let manager = create_manager(create_test(MEDIUM_TEST_QUESTIONS, 40));
    for width in [40, 80, 120, 200] {
        let result = benchmark(&format!("render_test - width {width}"), ITERATIONS, || {
            let _ = render_test(&manager, width, ViewState::default(), &theme);
        });
        result.print();
    }
}

#[test]
fn bench_navigation_order() {
    let manager = create_manager(create_test(LARGE_TEST_QUESTIONS, 10));
    let result = benchmark("navigation_order - 1000 questions", ITERATIONS, || {
        let order = navigation_order(&manager);
        assert!(!order.is_empty());
    });
    result.print();
}

#[test]
fn bench_manifest_serialization() {
    let test = create_test(LARGE_TEST_QUESTIONS, 20);
    let result = benchmark("to_manifest_json - 1000 questions", ITERATIONS, || {
        let json = to_manifest_json(&test).expect("test serializes");
        assert!(json.ends_with('\n'));
    });
    result.print();

    let mut storage = MemoryStorage::new();
    storage.store(&test).expect("memory storage accepts writes");
    let result = benchmark("load manifest - 1000 questions", ITERATIONS, || {
        let loaded = storage.load().expect("manifest parses");
        assert_eq!(loaded.questions.len(), LARGE_TEST_QUESTIONS);
    });
    result.print();
}

#[test]
fn bench_markup_normalization() {
    let test = create_styled_test(MEDIUM_TEST_QUESTIONS);
    let result = benchmark("markup::normalize - 100 questions", ITERATIONS, || {
        for question in &test.questions {
            let _ = markup::normalize(&question.text);
        }
    });
    result.print();
}

#[test]
fn bench_editing_insert_text() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           TEXT SURFACE EDITING BENCHMARKS                      ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let theme = Theme::default();
    for (name, questions) in [
        ("Small (10 questions)", SMALL_TEST_QUESTIONS),
        ("Large (1000 questions)", LARGE_TEST_QUESTIONS),
    ] {
        let mut manager = create_manager(create_test(questions, 20));
        let target = manager.blocks()[questions / 2].id();
        manager.request_activation(target, EditMode::Text);
        manager.text_input(TextInput::End);

        let result = benchmark(&format!("keystroke + render - {name}"), ITERATIONS, || {
            manager.text_input(TextInput::Char('x'));
            let render = render_test(&manager, 80, ViewState::default(), &theme);
            assert!(render.cursor.is_some());
        });
        result.print();
    }
}

#[test]
fn bench_full_edit_cycle() {
    let mut manager = create_manager(create_test(MEDIUM_TEST_QUESTIONS, 20));
    let ids: Vec<_> = manager.blocks().iter().map(|block| block.id()).collect();
    let mut index = 0;

    let result = benchmark("activate, type, save", ITERATIONS, || {
        let id = ids[index % ids.len()];
        index += 1;
        manager.request_activation(id, EditMode::Text);
        for ch in "edit".chars() {
            manager.text_input(TextInput::Char(ch));
        }
        assert!(manager.save_edit());
    });
    result.print();
}

#[test]
fn bench_structural_edits() {
    let mut manager = create_manager(create_test(MEDIUM_TEST_QUESTIONS, 10));

    let result = benchmark("add_block + move_block_up", ITERATIONS, || {
        let id = manager.add_block().expect("manager is unlocked");
        manager.move_block_up(id);
    });
    result.print();

    let result = benchmark("handle_reorder - first to last", ITERATIONS, || {
        let blocks = manager.blocks();
        let source = blocks[0].id();
        let target = blocks[blocks.len() - 1].id();
        manager.handle_reorder(source, target);
    });
    result.print();

    let result = benchmark("remove_block", ITERATIONS, || {
        let id = manager.blocks()[0].id();
        manager.remove_block(id);
    });
    result.print();
}
