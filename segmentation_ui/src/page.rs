use crate::branding::Branding;

const TITLE: &str = "Brain Tumor Segmentation";
const FAILED_MESSAGE: &str = "Segmentation failed. Please try again.";

/// Where the single-page workflow currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Idle,
    UploadRejected {
        message: String,
    },
    ImageUploaded {
        original: String,
    },
    PredictionDisplayed {
        original: String,
        segmented: String,
    },
    PredictionFailed {
        original: Option<String>,
        message: String,
    },
}

impl PageState {
    fn original(&self) -> Option<&str> {
        match self {
            PageState::ImageUploaded { original }
            | PageState::PredictionDisplayed { original, .. } => Some(original),
            PageState::PredictionFailed { original, .. } => original.as_deref(),
            PageState::Idle | PageState::UploadRejected { .. } => None,
        }
    }
}

pub struct PageContext<'a> {
    pub branding: &'a Branding,
    pub allowed_extensions: &'a [String],
    pub init_error: Option<&'a str>,
}

/// Renders the whole page; images are base64 PNG payloads without the data URI prefix.
pub fn render_page(state: &PageState, ctx: &PageContext) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", TITLE));
    if ctx.branding.logo().is_some() {
        html.push_str("<link rel=\"icon\" href=\"/logo.png\">\n");
    }
    html.push_str("<style>\n");
    html.push_str("body { font-family: sans-serif; margin: 0; display: flex; min-height: 100vh; }\n");
    html.push_str("aside { background-color: #1E1E2F; color: white; width: 280px; padding: 24px; }\n");
    html.push_str("aside h2 { color: white; }\n");
    html.push_str("main { flex: 1; padding: 24px 48px; max-width: 960px; margin: 0 auto; }\n");
    html.push_str("h1 { text-align: center; font-size: 36px; font-weight: bold; color: #2C3E50; }\n");
    html.push_str(".logo { text-align: center; }\n");
    html.push_str(".columns { display: grid; grid-template-columns: 1fr 1fr; gap: 24px; }\n");
    html.push_str(".columns figure { margin: 0; text-align: center; }\n");
    html.push_str(".columns img { width: 100%; }\n");
    html.push_str(".placeholder { border: 2px dashed #BBB; min-height: 200px; }\n");
    html.push_str("button { background-color: #3498DB; color: white; font-weight: bold; border: none; padding: 8px 16px; margin-top: 12px; }\n");
    html.push_str("button:hover { background-color: #2980B9; }\n");
    html.push_str(".error { background-color: #FDECEA; color: #B71C1C; padding: 12px; margin: 12px 0; }\n");
    html.push_str(".info { background-color: #E8F4FD; color: #0B5394; padding: 12px; }\n");
    html.push_str("</style>\n</head>\n<body>\n");

    render_sidebar(&mut html, state, ctx);

    html.push_str("<main>\n");
    if let Some(logo) = ctx.branding.logo_data_uri() {
        html.push_str(&format!(
            "<div class=\"logo\"><img src=\"{}\" width=\"100\" alt=\"logo\"></div>\n",
            logo
        ));
    }
    html.push_str(&format!("<h1>{}</h1>\n", TITLE));
    html.push_str(
        "<p style=\"text-align: center;\">Detect and segment brain tumors from MRI scans.</p>\n",
    );

    if let Some(init_error) = ctx.init_error {
        html.push_str(&format!(
            "<div class=\"error\" id=\"init-error\">The segmentation model is unavailable: {}</div>\n",
            escape_html(init_error)
        ));
    }

    match state {
        PageState::UploadRejected { message } => {
            html.push_str(&format!(
                "<div class=\"error\" id=\"upload-error\">{}</div>\n",
                escape_html(message)
            ));
        }
        PageState::PredictionFailed { message, .. } => {
            html.push_str(&format!(
                "<div class=\"error\" id=\"prediction-error\">{}<br>{}</div>\n",
                FAILED_MESSAGE,
                escape_html(message)
            ));
        }
        _ => {}
    }

    if let Some(original) = state.original() {
        html.push_str("<div class=\"columns\">\n");
        push_figure(&mut html, "uploaded", original, "Uploaded Image");
        match state {
            PageState::PredictionDisplayed { segmented, .. } => {
                push_figure(&mut html, "segmented", segmented, "Segmented Tumor");
            }
            _ => html.push_str("<div class=\"placeholder\" id=\"result-placeholder\"></div>\n"),
        }
        html.push_str("</div>\n");
    }

    html.push_str("<hr>\n");
    html.push_str(
        "<p class=\"info\">This app uses <b>YOLO-Seg</b> for real-time tumor segmentation. \
         Upload an MRI image to get started.</p>\n",
    );
    html.push_str("</main>\n</body>\n</html>\n");

    html
}

fn render_sidebar(html: &mut String, state: &PageState, ctx: &PageContext) {
    let accept = ctx
        .allowed_extensions
        .iter()
        .map(|ext| format!(".{}", escape_html(ext)))
        .collect::<Vec<_>>()
        .join(",");

    html.push_str("<aside>\n<h2>Upload an MRI Image</h2>\n");
    html.push_str("<form id=\"upload-form\" action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n");
    html.push_str("<label for=\"file\">Drag and drop or browse</label><br>\n");
    html.push_str(&format!(
        "<input type=\"file\" id=\"file\" name=\"file\" accept=\"{}\" required>\n",
        accept
    ));
    html.push_str("<button type=\"submit\">Upload</button>\n</form>\n");

    if let Some(original) = state.original() {
        html.push_str("<form id=\"predict-form\" action=\"/predict\" method=\"post\">\n");
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"image\" value=\"{}\">\n",
            escape_html(original)
        ));
        html.push_str("<button type=\"submit\">Predict Tumor Segmentation</button>\n</form>\n");
    }
    html.push_str("</aside>\n");
}

fn push_figure(html: &mut String, id: &str, png_base64: &str, caption: &str) {
    html.push_str(&format!(
        "<figure id=\"{}\"><img src=\"data:image/png;base64,{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>\n",
        id,
        escape_html(png_base64),
        caption,
        caption
    ));
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
