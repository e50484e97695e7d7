//! Instrument classes and their marker vocabularies.
//!
//! Every instrument runs through the same state machine; a class only decides
//! which filenames mark each stage boundary and how runs are labelled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    NextSeq,
    NovaSeq,
    MiSeq,
    Nanopore,
    Element,
}

impl InstrumentClass {
    pub const ALL: [InstrumentClass; 5] = [
        InstrumentClass::NextSeq,
        InstrumentClass::NovaSeq,
        InstrumentClass::MiSeq,
        InstrumentClass::Nanopore,
        InstrumentClass::Element,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InstrumentClass::NextSeq => "nextseq",
            InstrumentClass::NovaSeq => "novaseq",
            InstrumentClass::MiSeq => "miseq",
            InstrumentClass::Nanopore => "nanopore",
            InstrumentClass::Element => "element",
        }
    }

    /// Sequencer label used in notifications and command templates.
    pub fn sequencer_type(self) -> &'static str {
        match self {
            InstrumentClass::NextSeq => "NextSeq",
            InstrumentClass::NovaSeq => "NovaSeq",
            InstrumentClass::MiSeq => "MiSeq",
            InstrumentClass::Nanopore => "Nanopore",
            InstrumentClass::Element => "Element",
        }
    }

    pub fn run_type(self) -> &'static str {
        "NGI-RUN"
    }

    pub fn default_vocabulary(self) -> MarkerVocabulary {
        match self {
            InstrumentClass::NextSeq | InstrumentClass::NovaSeq | InstrumentClass::MiSeq => {
                MarkerVocabulary::new(
                    "RTAComplete.txt",
                    "Demultiplexing",
                    "SampleSheet.csv",
                    ".exitcode_for_bcl2fastq",
                )
            }
            InstrumentClass::Nanopore => MarkerVocabulary::new(
                "final_summary.txt",
                "nanoseq_output",
                "sample_sheet.csv",
                ".exitcode_for_nanoseq",
            ),
            InstrumentClass::Element => MarkerVocabulary::new(
                "RunUploaded.json",
                "Demultiplexing",
                "RunManifest.csv",
                ".exitcode_for_bases2fastq",
            ),
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstrumentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        InstrumentClass::ALL
            .into_iter()
            .find(|class| class.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = InstrumentClass::ALL.iter().map(|c| c.name()).collect();
                format!("unknown instrument class {s:?} (expected one of {known:?})")
            })
    }
}

/// Filenames (relative to the run directory) that encode stage boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerVocabulary {
    /// Plain file written by the instrument when sequencing is done.
    pub sequencing_complete: String,
    /// Directory created by the analysis pipeline.
    pub demux_dir: String,
    pub sample_sheet: String,
    /// File holding the pipeline exit code on its first line.
    pub exit_status: String,
}

impl MarkerVocabulary {
    pub fn new(
        sequencing_complete: &str,
        demux_dir: &str,
        sample_sheet: &str,
        exit_status: &str,
    ) -> Self {
        Self {
            sequencing_complete: sequencing_complete.to_string(),
            demux_dir: demux_dir.to_string(),
            sample_sheet: sample_sheet.to_string(),
            exit_status: exit_status.to_string(),
        }
    }

    pub fn names(&self) -> [&str; 4] {
        [
            &self.sequencing_complete,
            &self.demux_dir,
            &self.sample_sheet,
            &self.exit_status,
        ]
    }
}
