//! Scenario tests for the batch processor
//!
//! Each test builds a throwaway Input/Reference/Output/Archive layout and
//! runs the full month loop with a seeded random source.


use crate::config::Config;
use crate::models::{Attendee, Month};
use crate::processor::BatchProcessor;
use crate::roster::Roster;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Statement with one meeting, one entertainment and one ordinary row
pub const THREE_ROW_STATEMENT: &str = "カード名称,セゾンカード\n\
利用日,ご利用店名及び商品名,利用金額,備考\n\
2025/10/01,喫茶ルーム,15000,会議費\n\
2025/10/05,料亭さくら,5000,接待費\n\
2025/10/09,書店,2000,その他\n";

/// Directory layout used by the scenario tests
pub struct Workspace {
    pub temp_dir: TempDir,
    pub input: PathBuf,
    pub reference: PathBuf,
    pub output: PathBuf,
    pub archive: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let input = root.join("Input");
        let reference = root.join("Reference");
        let output = root.join("Output");
        let archive = root.join("Archive");
        for dir in [&input, &reference, &output, &archive] {
            fs::create_dir_all(dir).unwrap();
        }

        let mut roster = String::from("id,name,title,company\n");
        for id in 1..=10 {
            roster.push_str(&format!("{id},氏名{id},部長,会社{id}\n"));
        }
        fs::write(reference.join("NameList.csv"), roster).unwrap();

        Self {
            temp_dir,
            input,
            reference,
            output,
            archive,
        }
    }

    pub fn add_input(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.input.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> Config {
        Config::default()
            .with_input_dir(self.input.clone())
            .with_reference_dir(self.reference.clone())
            .with_output_dir(self.output.clone())
            .with_archive_dir(self.archive.clone())
            .with_seed(7)
    }

    pub fn processor(&self, config: Config) -> BatchProcessor {
        BatchProcessor::new(config).unwrap()
    }

    /// Processor over a roster built in memory
    pub fn processor_with_ids(&self, config: Config, ids: &[&str]) -> BatchProcessor {
        let attendees = ids
            .iter()
            .map(|id| Attendee {
                id: id.to_string(),
                name: format!("氏名{id}"),
                title: String::new(),
                company: String::new(),
            })
            .collect();
        let roster = Roster::new(attendees).unwrap();
        BatchProcessor::with_roster(config, roster, StdRng::seed_from_u64(7))
    }

    pub fn archived(&self, month: &str, name: &str) -> PathBuf {
        self.archive.join(month).join(name)
    }

    pub fn marker(&self, month: &str) -> PathBuf {
        self.archive.join(format!(".retry_{month}.json"))
    }
}

pub fn month(s: &str) -> Month {
    s.parse().unwrap()
}

/// Data lines of an enhanced CSV (BOM and pre-header lines removed)
pub fn output_lines(path: &Path) -> Vec<String> {
    let content = fs::read_to_string(path).unwrap();
    let content = content.trim_start_matches('\u{feff}');
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let header = lines
        .iter()
        .position(|l| l.starts_with("利用日"))
        .expect("header row in output");
    lines[header..].to_vec()
}
