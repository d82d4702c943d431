use serde::Serialize;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    White,
    Blue,
    Yellow,
    Cyan,
    LightCyan,
    Red,
    LightRed,
    Magenta,
    Green,
    DarkGrey,
}

#[derive(Serialize, Clone, Debug)]
pub struct Line {
    pub spans: Vec<LineSpan>,
}

#[derive(Serialize, Clone, Debug)]
pub struct LineSpan {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Line {
    pub fn str(str: &str) -> Line {
        span(str).line()
    }

    pub fn push(mut self, span: LineSpan) -> Line {
        self.spans.push(span);
        self
    }

    pub fn extend(mut self, spans: Vec<LineSpan>) -> Line {
        self.spans.extend(spans);
        self
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

impl LineSpan {
    pub fn line(self) -> Line {
        Line { spans: vec![self] }
    }

    pub fn bold(self) -> Self {
        LineSpan { bold: Some(true), ..self }
    }

    pub fn color(self, color: Color) -> Self {
        LineSpan { color: Some(color), ..self }
    }
}

pub fn span(str: &str) -> LineSpan {
    LineSpan { text: str.to_string(), bold: None, color: None }
}

pub fn line(spans: Vec<LineSpan>) -> Line {
    Line { spans }
}
