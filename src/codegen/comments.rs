// Comment extraction from SourceCodeInfo.
//
// Locations key comments by numeric descriptor path: [4, i] is message i,
// [4, i, 2, j] its field j, [4, i, 3, n] a nested message, [5, k] enum k,
// [5, k, 2, v] an enum value. The walker passes its position down and asks
// for the leading comment at each node.

use std::collections::HashMap;

use crate::descriptor::FileDescriptorProto;

#[derive(Default)]
pub struct CommentMap {
    comments: HashMap<Vec<i32>, String>,
}

impl CommentMap {
    pub fn build(file: &FileDescriptorProto) -> CommentMap {
        let mut comments = HashMap::new();

        let Some(info) = &file.source_code_info else {
            return CommentMap::default();
        };

        for location in &info.location {
            let Some(comment) = &location.leading_comments else {
                continue;
            };
            if location.path.is_empty() || comment.trim().is_empty() {
                continue;
            }
            // Line structure is carried through verbatim; the emitter decides
            // the comment syntax.
            comments.insert(location.path.clone(), comment.clone());
        }

        CommentMap { comments }
    }

    pub fn leading(&self, path: &[i32]) -> Option<&str> {
        self.comments.get(path).map(String::as_str)
    }
}
