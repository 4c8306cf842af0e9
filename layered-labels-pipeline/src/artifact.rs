use std::collections::BTreeMap;

use layered_labels::Document;

use crate::PipelineError;

/// Unit of work handed out by an [`ArtifactSource`](crate::ArtifactSource):
/// an id, string metadata and one or more named documents.
#[derive(Debug)]
pub struct Artifact {
    id: String,
    metadata: BTreeMap<String, String>,
    documents: BTreeMap<String, Document>,
}

impl Artifact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: BTreeMap::new(),
            documents: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Add a document named `name`. Names are unique within an artifact.
    pub fn add_document(
        &mut self,
        name: &str,
        text: impl Into<std::sync::Arc<str>>,
    ) -> Result<&mut Document, PipelineError> {
        use std::collections::btree_map::Entry;

        match self.documents.entry(name.to_string()) {
            Entry::Occupied(_) => Err(PipelineError::DuplicateDocument {
                artifact: self.id.clone(),
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(Document::new(name, text))),
        }
    }

    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    pub fn document_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.documents.get_mut(name)
    }

    /// Documents in name order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn documents_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_are_named_and_unique() {
        let mut artifact = Artifact::new("note-7");
        artifact.add_document("Original", "Took 2 pills.").unwrap();
        artifact.add_document("Summary", "2 pills").unwrap();

        assert!(matches!(
            artifact.add_document("Original", "again"),
            Err(PipelineError::DuplicateDocument { ref artifact, ref name })
                if artifact == "note-7" && name == "Original"
        ));

        let names: Vec<&str> = artifact.documents().map(|doc| doc.id()).collect();
        assert_eq!(names, vec!["Original", "Summary"]);
        assert_eq!(artifact.document("Summary").unwrap().text(), "2 pills");
        assert!(artifact.document("Missing").is_none());
    }

    #[test]
    fn test_metadata() {
        let mut artifact = Artifact::new("a");
        artifact.set_metadata("relativePath", "notes/a.txt");
        assert_eq!(artifact.metadata("relativePath"), Some("notes/a.txt"));
        assert_eq!(artifact.metadata("missing"), None);
        assert_eq!(
            artifact.metadata_entries().collect::<Vec<_>>(),
            vec![("relativePath", "notes/a.txt")]
        );
    }
}
