use lieferlern_core::{Discretizer, FeedbackEvent, Normalizer, ScoreWeights};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let normalizer = Normalizer::default();
    let discretizer = Discretizer::default();
    let weights = ScoreWeights::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: FeedbackEvent = serde_json::from_str(&line)?;
        match normalizer.from_feedback(&event) {
            Ok(scores) => println!(
                "{}\t{}\t{:.2}",
                event.supplier_id,
                discretizer.discretize(&scores),
                weights.blend(&scores)
            ),
            Err(e) => println!("{}\t<invalid: {e}>", event.supplier_id),
        }
    }

    Ok(())
}
