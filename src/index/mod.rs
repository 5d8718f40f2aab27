//! Indexing subsystem: C1 (manual indexer), C2 (embedding provider), C3
//! (vector index), wired together by `Indexer`.

pub mod embedding;
pub mod manpage;
pub mod vector_store;

use crate::types::CommandEntry;
use embedding::EmbeddingProvider;
use manpage::ManPageExtract;
use vector_store::VectorIndex;

/// Binds the embedding provider to the vector index and drives the
/// `build_index`/`refresh` contract of C1.
pub struct Indexer {
    embedder: EmbeddingProvider,
    index: VectorIndex,
}

impl Indexer {
    pub fn new(embedder: EmbeddingProvider, index: VectorIndex) -> Self {
        Self { embedder, index }
    }

    pub fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    /// Enumerates installed commands, parses each man page, embeds it, and
    /// upserts it into the vector index. Individual failures are skipped
    /// and counted, never fatal to the run.
    pub fn build_index(&mut self) -> anyhow::Result<(usize, usize)> {
        let commands = manpage::list_commands()?;
        let mut written = 0usize;
        let mut skipped = 0usize;
        let mut entries = Vec::with_capacity(commands.len());

        for (name, section) in commands {
            match manpage::load_manpage(&name, &section) {
                Ok(extract) => {
                    entries.push(self.to_command_entry(extract));
                    manpage::log_indexed(&name);
                    written += 1;
                }
                Err(err) => {
                    manpage::log_skip(&name, &err);
                    skipped += 1;
                }
            }
        }

        self.index.upsert(entries)?;
        Ok((written, skipped))
    }

    /// Re-indexes one command, returning whether its content changed.
    pub fn refresh(&mut self, command_name: &str) -> anyhow::Result<bool> {
        let commands = manpage::list_commands()?;
        let section = commands
            .into_iter()
            .find(|(name, _)| name == command_name)
            .map(|(_, section)| section)
            .unwrap_or_else(|| "1".to_string());

        let extract = manpage::load_manpage(command_name, &section)?;
        let previous = self.previous_extract(command_name);
        let changed = manpage::extract_changed(previous.as_ref(), &extract);
        let entry = self.to_command_entry(extract);
        self.index.upsert(vec![entry])?;
        Ok(changed)
    }

    /// Inserts a synthetic `section = "org"` entry (organizational prose),
    /// which participates in search the same way commands do.
    pub fn insert_org_entry(
        &mut self,
        name: &str,
        synopsis: &str,
        description: &str,
    ) -> anyhow::Result<()> {
        let embedding_source = format!("{name}\n{synopsis}\n{description}");
        let embedding = self.embedder.embed(&embedding_source);
        self.index.upsert(vec![CommandEntry {
            name: name.to_string(),
            section: "org".to_string(),
            synopsis: synopsis.to_string(),
            description: description.to_string(),
            embedding,
        }])
    }

    fn to_command_entry(&mut self, extract: ManPageExtract) -> CommandEntry {
        let mut entry = CommandEntry {
            name: extract.name,
            section: extract.section,
            synopsis: extract.synopsis,
            description: extract.description,
            embedding: Vec::new(),
        };
        entry.embedding = self.embedder.embed(&entry.embedding_source());
        entry
    }

    fn previous_extract(&self, name: &str) -> Option<ManPageExtract> {
        self.index
            .search(&vec![0.0; crate::types::EMBEDDING_DIM], usize::MAX, -1.0, |e| {
                e.name == name
            })
            .into_iter()
            .next()
            .map(|(entry, _)| ManPageExtract {
                name: entry.name,
                section: entry.section,
                synopsis: entry.synopsis,
                description: entry.description,
            })
    }
}
