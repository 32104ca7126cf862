use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("Compute stack underflow emitting '{instruction}': {popped} popped at depth {depth}")]
    StackUnderflow {
        instruction: String,
        popped: usize,
        depth: usize,
    },
}

/// Collects emitted program lines and tracks the logical compute-stack depth
/// for the statement currently being lowered.
///
/// The emitter trusts the caller's pushed/popped annotations; its only
/// semantic duty is refusing to pop below an empty stack.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    lines: Vec<String>,
    depth: usize,
}

impl CodeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one instruction line and applies its declared stack effect.
    pub fn add(&mut self, text: &str, pushed: usize, popped: usize) -> Result<(), EmitError> {
        self.push_line(text.to_string(), pushed, popped)
    }

    pub fn add_with_comment(
        &mut self,
        text: &str,
        pushed: usize,
        popped: usize,
        comment: &str,
    ) -> Result<(), EmitError> {
        self.push_line(format!("{text} // {comment}"), pushed, popped)
    }

    fn push_line(&mut self, line: String, pushed: usize, popped: usize) -> Result<(), EmitError> {
        if self.depth < popped {
            return Err(EmitError::StackUnderflow {
                instruction: line,
                popped,
                depth: self.depth,
            });
        }
        self.depth = self.depth - popped + pushed;
        self.lines.push(line);
        Ok(())
    }

    pub fn label(&mut self, name: &str) {
        self.lines.push(format!("{name}:"));
    }

    pub fn label_with_comment(&mut self, name: &str, comment: &str) {
        self.lines.push(format!("{name}: // {comment}"));
    }

    /// Cosmetic separator: a blank line, optionally a comment header.
    pub fn section(&mut self, title: Option<&str>) {
        self.lines.push(String::new());
        if let Some(title) = title {
            self.lines.push(format!("// {title}"));
        }
    }

    /// Statement boundary: the logical stack starts over.
    pub fn reset_stack(&mut self) {
        self.depth = 0;
    }

    /// Frame boundary: values a caller already pushed become visible to the
    /// depth accounting of the code emitted next.
    pub fn assume_stack(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Drains whatever the current statement left on the compute stack.
    pub fn pop_all(&mut self) {
        while self.depth > 0 {
            self.lines.push("pop".to_string());
            self.depth -= 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn output(&self) -> String {
        self.lines.join("\r\n")
    }
}
