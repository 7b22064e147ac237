//! Recursive diff over paired folders, producing the operation tree that
//! transforms left into right.

use std::cmp::Ordering;

use tracing::debug;

use fsdiff_common::{normalize, same_glob_set, should_exclude, Config};

use crate::equality::{decide_file, CompareOptions};
use crate::loader::TreeObserver;
use crate::operation::{Operation, Reason, Witness};
use crate::tree::{Entry, Folder};

/// Compares `a` to `b` and returns the patch that transforms `a` into `b`,
/// rooted in a ChangeDir at `"."`, or Noop when the trees agree.
///
/// Trees whose exclude-glob sets differ as multisets cannot be compared;
/// the result is then a childless ChangeDir whose reason carries both sets.
pub fn diff(a: &Folder, b: &Folder, config: &Config) -> Operation {
    if !same_glob_set(a.exclude_globs(), b.exclude_globs()) {
        return Operation::change_dir_with_reason(
            ".",
            Vec::new(),
            Reason::because(
                Witness::Globs(a.exclude_globs().to_vec()),
                Witness::Globs(b.exclude_globs().to_vec()),
            ),
        );
    }

    let excludes = effective_excludes(a, config);
    let opts = CompareOptions::from_config(config);
    let operations = diff_children(a, b, "", &excludes, &opts, config.case_sensitive);
    if operations.is_empty() {
        Operation::noop()
    } else {
        debug!("diff produced {} root operations", operations.len());
        Operation::change_dir(".", operations)
    }
}

/// Streaming variant: operations are delivered through `on_op` with fully
/// normalized relative paths, in deterministic depth-first left-to-right
/// order. Directory visits and compared files are reported to `observer`.
/// Returns whether any difference was found.
pub fn diff_streaming(
    a: &Folder,
    b: &Folder,
    config: &Config,
    observer: Option<&dyn TreeObserver>,
    on_op: &mut dyn FnMut(Operation),
) -> bool {
    if !same_glob_set(a.exclude_globs(), b.exclude_globs()) {
        on_op(Operation::change_dir_with_reason(
            ".",
            Vec::new(),
            Reason::because(
                Witness::Globs(a.exclude_globs().to_vec()),
                Witness::Globs(b.exclude_globs().to_vec()),
            ),
        ));
        return true;
    }
    let excludes = effective_excludes(a, config);
    let opts = CompareOptions::from_config(config);
    stream_children(
        a,
        b,
        "",
        &excludes,
        &opts,
        config.case_sensitive,
        observer,
        on_op,
    )
}

/// Config globs plus the (verified equal) tree-carried globs.
fn effective_excludes(a: &Folder, config: &Config) -> Vec<String> {
    let mut excludes = config.exclude_globs.clone();
    excludes.extend(a.exclude_globs().iter().cloned());
    excludes
}

fn sorted_keys(folder: &Folder, case_sensitive: bool) -> Vec<String> {
    let mut names = folder.sorted_names();
    if !case_sensitive {
        // stable sort: names equal under fold stay in lexicographic order
        names.sort_by_key(|name| name.to_lowercase());
    }
    names
}

fn fold(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

fn diff_children(
    a: &Folder,
    b: &Folder,
    prefix: &str,
    excludes: &[String],
    opts: &CompareOptions<'_>,
    case_sensitive: bool,
) -> Vec<Operation> {
    let a_names = sorted_keys(a, case_sensitive);
    let b_names = sorted_keys(b, case_sensitive);
    let mut operations = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < a_names.len() || j < b_names.len() {
        if i < a_names.len() && should_exclude(&normalize(prefix, &a_names[i]), excludes) {
            i += 1;
            continue;
        }
        if j < b_names.len() && should_exclude(&normalize(prefix, &b_names[j]), excludes) {
            j += 1;
            continue;
        }
        if i >= a_names.len() {
            let b_key = &b_names[j];
            operations.push(b.get(b_key).create_operation(b_key));
            j += 1;
            continue;
        }
        if j >= b_names.len() {
            let a_key = &a_names[i];
            operations.push(a.get(a_key).remove_operation(a_key));
            i += 1;
            continue;
        }

        let a_key = &a_names[i];
        let b_key = &b_names[j];
        match fold(a_key, case_sensitive).cmp(&fold(b_key, case_sensitive)) {
            Ordering::Less => {
                operations.push(a.get(a_key).remove_operation(a_key));
                i += 1;
            }
            Ordering::Greater => {
                operations.push(b.get(b_key).create_operation(b_key));
                j += 1;
            }
            Ordering::Equal => {
                let a_entry = a.get(a_key);
                let b_entry = b.get(b_key);
                match (a_entry, b_entry) {
                    (Entry::File(file_a), Entry::File(file_b)) => {
                        if let Some(reason) = decide_file(file_a, file_b, opts) {
                            operations.push(Operation::change_file(b_key, reason));
                        }
                    }
                    (Entry::Folder(dir_a), Entry::Folder(dir_b)) => {
                        let sub_prefix = normalize(prefix, b_key);
                        let sub = diff_children(
                            dir_a,
                            dir_b,
                            &sub_prefix,
                            excludes,
                            opts,
                            case_sensitive,
                        );
                        if !sub.is_empty() {
                            operations.push(Operation::change_dir(b_key, sub));
                        }
                    }
                    (Entry::Symlink(link_a), Entry::Symlink(link_b)) => {
                        // there is no ChangeLink; a changed target is a
                        // remove/create pair
                        if let Some(reason) = link_a.equal_with_reason(link_b) {
                            operations
                                .push(link_a.remove_operation(a_key).with_reason(reason.clone()));
                            operations.push(link_b.create_operation(b_key).with_reason(reason));
                        }
                    }
                    _ => {
                        let reason = Reason::type_changed(a_entry.kind(), b_entry.kind());
                        operations
                            .push(a_entry.remove_operation(a_key).with_reason(reason.clone()));
                        operations.push(b_entry.create_operation(b_key).with_reason(reason));
                    }
                }
                i += 1;
                j += 1;
            }
        }
    }
    operations
}

#[allow(clippy::too_many_arguments)]
fn stream_children(
    a: &Folder,
    b: &Folder,
    prefix: &str,
    excludes: &[String],
    opts: &CompareOptions<'_>,
    case_sensitive: bool,
    observer: Option<&dyn TreeObserver>,
    on_op: &mut dyn FnMut(Operation),
) -> bool {
    if let Some(observer) = observer {
        observer.on_directory_visit(if prefix.is_empty() { "." } else { prefix });
    }

    let a_names = sorted_keys(a, case_sensitive);
    let b_names = sorted_keys(b, case_sensitive);
    let mut changed = false;
    let mut i = 0;
    let mut j = 0;

    while i < a_names.len() || j < b_names.len() {
        if i < a_names.len() && should_exclude(&normalize(prefix, &a_names[i]), excludes) {
            i += 1;
            continue;
        }
        if j < b_names.len() && should_exclude(&normalize(prefix, &b_names[j]), excludes) {
            j += 1;
            continue;
        }
        if i >= a_names.len() {
            let b_key = &b_names[j];
            emit_create(b.get(b_key), &normalize(prefix, b_key), None, on_op);
            changed = true;
            j += 1;
            continue;
        }
        if j >= b_names.len() {
            let a_key = &a_names[i];
            emit_remove(a.get(a_key), &normalize(prefix, a_key), None, on_op);
            changed = true;
            i += 1;
            continue;
        }

        let a_key = &a_names[i];
        let b_key = &b_names[j];
        match fold(a_key, case_sensitive).cmp(&fold(b_key, case_sensitive)) {
            Ordering::Less => {
                emit_remove(a.get(a_key), &normalize(prefix, a_key), None, on_op);
                changed = true;
                i += 1;
            }
            Ordering::Greater => {
                emit_create(b.get(b_key), &normalize(prefix, b_key), None, on_op);
                changed = true;
                j += 1;
            }
            Ordering::Equal => {
                let a_entry = a.get(a_key);
                let b_entry = b.get(b_key);
                let full = normalize(prefix, b_key);
                match (a_entry, b_entry) {
                    (Entry::File(file_a), Entry::File(file_b)) => {
                        if let Some(reason) = decide_file(file_a, file_b, opts) {
                            on_op(Operation::change_file(&full, reason));
                            changed = true;
                        }
                        if let Some(observer) = observer {
                            observer.on_file_done(&full);
                        }
                    }
                    (Entry::Folder(dir_a), Entry::Folder(dir_b)) => {
                        changed |= stream_children(
                            dir_a,
                            dir_b,
                            &full,
                            excludes,
                            opts,
                            case_sensitive,
                            observer,
                            on_op,
                        );
                    }
                    (Entry::Symlink(link_a), Entry::Symlink(link_b)) => {
                        if let Some(reason) = link_a.equal_with_reason(link_b) {
                            emit_remove(
                                a_entry,
                                &normalize(prefix, a_key),
                                Some(reason.clone()),
                                on_op,
                            );
                            emit_create(b_entry, &full, Some(reason), on_op);
                            changed = true;
                        }
                    }
                    _ => {
                        let reason = Reason::type_changed(a_entry.kind(), b_entry.kind());
                        emit_remove(
                            a_entry,
                            &normalize(prefix, a_key),
                            Some(reason.clone()),
                            on_op,
                        );
                        emit_create(b_entry, &full, Some(reason), on_op);
                        changed = true;
                    }
                }
                i += 1;
                j += 1;
            }
        }
    }
    changed
}

fn emit_create(
    entry: &Entry,
    path: &str,
    reason: Option<Reason>,
    on_op: &mut dyn FnMut(Operation),
) {
    match entry {
        Entry::Folder(folder) => {
            let mut op = Operation::create_dir(path, Vec::new());
            if let Some(reason) = reason {
                op = op.with_reason(reason);
            }
            on_op(op);
            for name in folder.sorted_names() {
                emit_create(folder.get(&name), &normalize(path, &name), None, on_op);
            }
        }
        _ => {
            let mut op = entry.create_operation(path);
            if let Some(reason) = reason {
                op = op.with_reason(reason);
            }
            on_op(op);
        }
    }
}

fn emit_remove(
    entry: &Entry,
    path: &str,
    reason: Option<Reason>,
    on_op: &mut dyn FnMut(Operation),
) {
    match entry {
        Entry::Folder(folder) => {
            let mut op = Operation::remove_dir(path, Vec::new());
            if let Some(reason) = reason {
                op = op.with_reason(reason);
            }
            on_op(op);
            for name in folder.sorted_names() {
                emit_remove(folder.get(&name), &normalize(path, &name), None, on_op);
            }
        }
        _ => {
            let mut op = entry.remove_operation(path);
            if let Some(reason) = reason {
                op = op.with_reason(reason);
            }
            on_op(op);
        }
    }
}
