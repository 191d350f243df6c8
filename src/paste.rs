#[derive(Debug, Clone, PartialEq)]
pub struct PastedLine<'a> {
    pub cells: Vec<&'a str>,
}

impl<'a> PastedLine<'a> {
    pub fn first_two(&self) -> Option<(&'a str, &'a str)> {
        match self.cells.as_slice() {
            [a, b, ..] => Some((*a, *b)),
            _ => None,
        }
    }
}

pub fn parse_block(text: &str) -> Vec<PastedLine<'_>> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect()
}

// Tab-delimited lines keep empty cells positional.
fn split_line(line: &str) -> PastedLine<'_> {
    let cells = if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };
    PastedLine { cells }
}
