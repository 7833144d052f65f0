//! Browsing a tag index end to end: events in, filesystem view out

use std::thread;

use anyhow::Result;
use common::prelude::*;

fn document(id: u64, name: &str, tags: &[TagId]) -> Document {
    Document {
        id,
        tags: tags.to_vec(),
        archived_file_name: Some(name.to_string()),
        archive_media_filename: Some(format!("{:07}.pdf", id)),
        media_filename: Some(format!("{:07}.png", id)),
        original_filename: None,
        has_archive_version: true,
        created: Some("2024-03-01T09:00:00Z".to_string()),
        added: Some("2024-03-02T09:00:00Z".to_string()),
        modified: None,
    }
}

fn entry_names(entries: &[DirEntry], kind: EntryKind) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.name.clone())
        .collect()
}

#[test]
fn test_browse_and_reconcile() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let updater = IndexUpdater::new(SharedIndex::new(), MediaRoot::new("/srv/media"));
    updater.apply(SyncEvent::TagsAdded(vec![
        Tag::new(1, "taxes"),
        Tag::new(2, "2023"),
        Tag::new(3, "insurance"),
    ]));
    updater.apply(SyncEvent::DocumentsAdded(vec![
        document(10, "receipt.pdf", &[1, 2]),
        document(11, "receipt.pdf", &[1]),
        document(12, "policy.pdf", &[3]),
        document(13, "notes.txt", &[]),
    ]));

    {
        let index = updater.index().read();
        let view = VirtualFsView::new(&index);

        let root = view.list("/");
        assert_eq!(
            entry_names(&root, EntryKind::Directory),
            vec!["2023", "insurance", "taxes"]
        );
        assert_eq!(root.len(), 3 + 4);

        let taxes = view.list("/taxes");
        assert_eq!(entry_names(&taxes, EntryKind::Directory), vec!["2023"]);
        assert_eq!(
            entry_names(&taxes, EntryKind::Symlink),
            vec!["receipt.10.pdf", "receipt.11.pdf"]
        );

        let narrowed = view.list("/taxes/2023");
        assert_eq!(narrowed, view.list("/2023/taxes"));
        assert_eq!(
            entry_names(&narrowed, EntryKind::Symlink),
            vec!["receipt.10.pdf"]
        );

        assert_eq!(
            view.resolve_link("/taxes/2023/receipt.10.pdf")?,
            std::path::Path::new("/srv/media/documents/archive/0000010.pdf")
        );
    }

    // document 10 and tag 3 were deleted upstream
    updater.apply(SyncEvent::CanonicalDocumentIds(vec![11, 12, 13]));
    updater.apply(SyncEvent::CanonicalTagIds(vec![1, 2]));

    let index = updater.index().read();
    let view = VirtualFsView::new(&index);
    assert!(view.list("/taxes/2023").is_empty());
    assert_eq!(entry_names(&view.list("/"), EntryKind::Directory), vec!["taxes"]);
    assert!(matches!(
        view.attributes("/insurance"),
        Err(ViewError::NotFound(_))
    ));
    // the file survives its tag
    assert!(view.attributes("/policy.12.pdf").is_ok());

    Ok(())
}

#[test]
fn test_readers_never_see_partial_files() {
    let index = SharedIndex::new();
    for id in 0..4 {
        index.add_tag(Tag::new(id, format!("tag{}", id)));
    }

    let writer = {
        let updater = IndexUpdater::new(index.clone(), MediaRoot::new("/media"));
        thread::spawn(move || {
            for id in 0..200u64 {
                let tags: Vec<TagId> = (0..4).filter(|t| id % (t + 1) == 0).collect();
                updater.apply(SyncEvent::DocumentsAdded(vec![document(
                    id,
                    "doc.pdf",
                    &tags,
                )]));
                if id % 10 == 9 {
                    let keep: Vec<u64> = (0..=id).filter(|d| d % 3 != 0).collect();
                    updater.apply(SyncEvent::CanonicalDocumentIds(keep));
                }
            }
        })
    };

    let reader = {
        let index = index.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let index = index.read();
                let all = index.files_in([]);
                for file in all.iter() {
                    for tag in &file.tags {
                        let name = format!("tag{}", tag);
                        assert!(index.files_in([name.as_str()]).contains(file));
                    }
                    assert!(index.file_by_display_name(&file.display_name).is_some());
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}
